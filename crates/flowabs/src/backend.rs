use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::Result;
use crate::gpu::uniforms::StageUniforms;
use crate::image::Image;
use crate::stage::StageKind;

/// Pixel formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel, normalized. Host frames, noise and presentable output.
    Rgba8Unorm,
    /// Half-float per channel. Every engine intermediate (Lab, tensors, flow).
    Rgba16Float,
}

impl PixelFormat {
    pub fn index(self) -> usize {
        match self {
            PixelFormat::Rgba8Unorm => 0,
            PixelFormat::Rgba16Float => 1,
        }
    }
}

/// Process-unique identity of a backend texture. Used to reject draws
/// that would sample the target they write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TextureId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Counts live render targets. Each target holds a [`LiveToken`] that
/// decrements the count when the target is dropped.
#[derive(Debug, Clone, Default)]
pub struct LiveCounter(Arc<AtomicUsize>);

impl LiveCounter {
    pub fn token(&self) -> LiveToken {
        self.0.fetch_add(1, Ordering::Relaxed);
        LiveToken(self.0.clone())
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct LiveToken(Arc<AtomicUsize>);

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub trait BackendTexture {
    fn id(&self) -> TextureId;
    fn size(&self) -> (u32, u32);
    fn format(&self) -> PixelFormat;
}

/// Everything the orchestration layer needs from a renderer: surfaces,
/// programs and fullscreen draws. Implemented by [`crate::gpu::WgpuBackend`]
/// and by the reference [`crate::cpu::CpuBackend`].
pub trait RenderBackend {
    type Texture: BackendTexture;
    type Program;

    /// Allocate a texture that can be drawn into and sampled afterwards.
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        label: &str,
    ) -> Result<Self::Texture>;

    /// Create a sample-only texture from CPU pixels (host frames, noise).
    fn upload_texture(
        &mut self,
        image: &Image,
        format: PixelFormat,
        label: &str,
    ) -> Result<Self::Texture>;

    /// Build the program for one stage kind, specialized to the frame size.
    fn create_program(&mut self, kind: StageKind, width: u32, height: u32)
    -> Result<Self::Program>;

    /// One fullscreen draw: sample `inputs` (unit 0, unit 1) and write `target`.
    fn draw(
        &mut self,
        program: &Self::Program,
        uniforms: &StageUniforms,
        inputs: &[&Self::Texture],
        target: &Self::Texture,
    ) -> Result<()>;

    /// Copy a texture back to the CPU.
    fn read_texture(&mut self, texture: &Self::Texture) -> Result<Image>;

    /// Number of render targets currently alive on this backend.
    fn live_render_targets(&self) -> usize;
}
