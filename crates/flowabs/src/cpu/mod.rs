//! Reference backend: every stage evaluated per pixel on the CPU.
//!
//! Slow, deterministic and adapter-free, which makes it the backend the test
//! suite runs on. Storage stays `f32` for every format; targets declared
//! `Rgba8Unorm` are clamped to [0,1] on write like a GPU attachment would.

pub mod color;
pub mod kernels;

use std::cell::RefCell;

use glam::{Vec2, Vec4};

use crate::backend::{BackendTexture, LiveCounter, LiveToken, PixelFormat, RenderBackend, TextureId};
use crate::error::{FlowAbsError, Result};
use crate::gpu::uniforms::StageUniforms;
use crate::image::Image;
use crate::stage::StageKind;

use kernels::Fragment;

pub struct CpuTexture {
    id: TextureId,
    format: PixelFormat,
    image: RefCell<Image>,
    _live: Option<LiveToken>,
}

impl BackendTexture for CpuTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn size(&self) -> (u32, u32) {
        let img = self.image.borrow();
        (img.width(), img.height())
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

pub struct CpuProgram {
    kind: StageKind,
    size: Vec2,
}

#[derive(Default)]
pub struct CpuBackend {
    live: LiveCounter,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderBackend for CpuBackend {
    type Texture = CpuTexture;
    type Program = CpuProgram;

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        label: &str,
    ) -> Result<CpuTexture> {
        if width == 0 || height == 0 {
            return Err(FlowAbsError::Texture {
                label: label.to_string(),
                reason: format!("invalid size {width}x{height}"),
            });
        }
        Ok(CpuTexture {
            id: TextureId::next(),
            format,
            image: RefCell::new(Image::filled(width, height, Vec4::ZERO)),
            _live: Some(self.live.token()),
        })
    }

    fn upload_texture(&mut self, image: &Image, format: PixelFormat, _label: &str) -> Result<CpuTexture> {
        Ok(CpuTexture {
            id: TextureId::next(),
            format,
            image: RefCell::new(image.clone()),
            _live: None,
        })
    }

    fn create_program(&mut self, kind: StageKind, width: u32, height: u32) -> Result<CpuProgram> {
        Ok(CpuProgram {
            kind,
            size: Vec2::new(width as f32, height as f32),
        })
    }

    fn draw(
        &mut self,
        program: &CpuProgram,
        uniforms: &StageUniforms,
        inputs: &[&CpuTexture],
        target: &CpuTexture,
    ) -> Result<()> {
        let kind = program.kind;
        if inputs.len() != kind.input_count() {
            return Err(FlowAbsError::InputCount {
                stage: kind,
                expected: kind.input_count(),
                got: inputs.len(),
            });
        }
        if inputs.iter().any(|t| t.id == target.id) {
            return Err(FlowAbsError::FeedbackLoop { stage: kind });
        }

        let img = inputs[0].image.borrow();
        let guide = inputs.get(1).map(|t| t.image.borrow());
        let fragment = Fragment {
            u: uniforms,
            size: program.size,
            img: &img,
            guide: guide.as_deref(),
        };

        let mut out = target.image.borrow_mut();
        let (w, h) = (out.width(), out.height());
        let clamp = target.format == PixelFormat::Rgba8Unorm;
        for y in 0..h {
            for x in 0..w {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / Vec2::new(w as f32, h as f32);
                let mut c = kernels::shade(kind, &fragment, uv);
                if clamp {
                    c = c.clamp(Vec4::ZERO, Vec4::ONE);
                }
                out.set(x, y, c);
            }
        }
        Ok(())
    }

    fn read_texture(&mut self, texture: &CpuTexture) -> Result<Image> {
        Ok(texture.image.borrow().clone())
    }

    fn live_render_targets(&self) -> usize {
        self.live.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_draw_reproduces_input() {
        let mut backend = CpuBackend::new();
        let src = Image::from_fn(5, 3, |x, y| Vec4::new(x as f32 * 0.2, y as f32 * 0.3, 0.5, 1.0));
        let input = backend.upload_texture(&src, PixelFormat::Rgba8Unorm, "src").unwrap();
        let target = backend
            .create_render_target(5, 3, PixelFormat::Rgba16Float, "dst")
            .unwrap();
        let program = backend.create_program(StageKind::Copy, 5, 3).unwrap();
        backend
            .draw(&program, &StageUniforms::default(), &[&input], &target)
            .unwrap();
        let out = backend.read_texture(&target).unwrap();
        assert!(out.max_rgb_diff(&src) < 1e-5);
    }

    #[test]
    fn unorm_targets_clamp() {
        let mut backend = CpuBackend::new();
        let lab = Image::filled(2, 2, Vec4::new(50.0, 0.0, 0.0, 1.0));
        let input = backend.upload_texture(&lab, PixelFormat::Rgba16Float, "lab").unwrap();
        let target = backend
            .create_render_target(2, 2, PixelFormat::Rgba8Unorm, "dst")
            .unwrap();
        let program = backend.create_program(StageKind::Copy, 2, 2).unwrap();
        backend
            .draw(&program, &StageUniforms::default(), &[&input], &target)
            .unwrap();
        let out = backend.read_texture(&target).unwrap();
        assert_eq!(out.get(1, 1).x, 1.0);
    }

    #[test]
    fn only_render_targets_are_counted() {
        let mut backend = CpuBackend::new();
        let _upload = backend
            .upload_texture(&Image::new(2, 2), PixelFormat::Rgba8Unorm, "up")
            .unwrap();
        let a = backend
            .create_render_target(2, 2, PixelFormat::Rgba16Float, "a")
            .unwrap();
        assert_eq!(backend.live_render_targets(), 1);
        drop(a);
        assert_eq!(backend.live_render_targets(), 0);
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let mut backend = CpuBackend::new();
        let err = backend
            .create_render_target(0, 4, PixelFormat::Rgba16Float, "bad")
            .err()
            .unwrap();
        assert_eq!(err.class(), crate::error::ErrorClass::Resource);
    }
}
