use glam::Vec4;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::image::Image;

/// Seed shared by every engine so LIC output is reproducible run to run.
pub const NOISE_SEED: u64 = 0x00F1_0AB5;

/// Correlated white noise for line-integral convolution.
///
/// Uniform samples are smoothed once with the separable `[1/4, 1/2, 1/4]`
/// kernel, clamping at the borders. The value is replicated into RGB.
pub fn generate(width: u32, height: u32) -> Image {
    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    let w = width as usize;
    let h = height as usize;
    let raw: Vec<f32> = (0..w * h).map(|_| rng.r#gen::<f32>()).collect();

    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &raw[y * w..(y + 1) * w];
        for x in 0..w {
            let l = row[x.saturating_sub(1)];
            let r = row[(x + 1).min(w - 1)];
            horizontal[y * w + x] = 0.25 * l + 0.5 * row[x] + 0.25 * r;
        }
    }

    Image::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let up = horizontal[y.saturating_sub(1) * w + x];
        let down = horizontal[(y + 1).min(h - 1) * w + x];
        let v = 0.25 * up + 0.5 * horizontal[y * w + x] + 0.25 * down;
        Vec4::new(v, v, v, 1.0)
    })
}
