use crate::backend::{BackendTexture, PixelFormat, RenderBackend, TextureId};
use crate::error::Result;

/// A texture that stages draw into and later stages sample from.
///
/// Dropping the target releases its backend resources.
pub struct RenderTarget<B: RenderBackend> {
    texture: B::Texture,
    width: u32,
    height: u32,
    format: PixelFormat,
    label: String,
}

impl<B: RenderBackend> RenderTarget<B> {
    pub fn new(
        backend: &mut B,
        width: u32,
        height: u32,
        format: PixelFormat,
        label: &str,
    ) -> Result<Self> {
        let texture = backend.create_render_target(width, height, format, label)?;
        Ok(Self {
            texture,
            width,
            height,
            format,
            label: label.to_string(),
        })
    }

    pub fn texture(&self) -> &B::Texture {
        &self.texture
    }

    pub fn id(&self) -> TextureId {
        self.texture.id()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
