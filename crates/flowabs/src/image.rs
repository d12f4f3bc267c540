use glam::{Vec2, Vec4};

/// RGBA float image in row-major order. The CPU-side currency for host
/// frames, readbacks and the reference backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Vec4::new(0.0, 0.0, 0.0, 1.0))
    }

    pub fn filled(width: u32, height: u32, value: Vec4) -> Self {
        assert!(width > 0 && height > 0, "image must be at least 1x1");
        Self {
            width,
            height,
            pixels: vec![value; (width * height) as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Vec4) -> Self {
        assert!(width > 0 && height > 0, "image must be at least 1x1");
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        self.pixels[(y * self.width + x) as usize] = value;
    }

    /// Texel fetch with clamp-to-edge addressing.
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.get(x, y)
    }

    /// Bilinear sample at normalized coordinates, clamp-to-edge. Matches a
    /// wgpu linear sampler: texel `i` has its center at `(i + 0.5) / size`.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let p = uv * self.size() - Vec2::splat(0.5);
        let base = p.floor();
        let f = p - base;
        let x0 = base.x as i32;
        let y0 = base.y as i32;
        let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), f.x);
        let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), f.x);
        top.lerp(bottom, f.y)
    }

    /// Largest per-channel RGB difference between two images of equal size.
    pub fn max_rgb_diff(&self, other: &Image) -> f32 {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "size mismatch"
        );
        self.pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| (a.truncate() - b.truncate()).abs().max_element())
            .fold(0.0, f32::max)
    }

    pub fn from_rgba8(img: &::image::RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        Self::from_fn(w, h, |x, y| {
            let p = img.get_pixel(x, y).0;
            Vec4::new(
                p[0] as f32 / 255.0,
                p[1] as f32 / 255.0,
                p[2] as f32 / 255.0,
                p[3] as f32 / 255.0,
            )
        })
    }

    pub fn to_rgba8(&self) -> ::image::RgbaImage {
        ::image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let p = self.get(x, y);
            ::image::Rgba([
                unorm8(p.x),
                unorm8(p.y),
                unorm8(p.z),
                unorm8(p.w),
            ])
        })
    }

    /// Pack into tightly laid out RGBA8 bytes (row-major, no padding).
    pub fn to_rgba8_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for p in &self.pixels {
            out.extend_from_slice(&[unorm8(p.x), unorm8(p.y), unorm8(p.z), unorm8(p.w)]);
        }
        out
    }

    pub fn from_rgba8_bytes(width: u32, height: u32, bytes: &[u8]) -> Self {
        Self::from_fn(width, height, |x, y| {
            let i = ((y * width + x) * 4) as usize;
            Vec4::new(
                bytes[i] as f32 / 255.0,
                bytes[i + 1] as f32 / 255.0,
                bytes[i + 2] as f32 / 255.0,
                bytes[i + 3] as f32 / 255.0,
            )
        })
    }
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
