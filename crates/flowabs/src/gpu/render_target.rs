use wgpu::{Device, Texture, TextureFormat, TextureUsages, TextureView};

use crate::backend::{BackendTexture, LiveToken, PixelFormat, TextureId};

pub fn texture_format(format: PixelFormat) -> TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba16Float => TextureFormat::Rgba16Float,
    }
}

/// A GPU texture with its default view. Render targets carry a live token;
/// uploaded sources do not.
pub struct GpuTexture {
    pub id: TextureId,
    pub texture: Texture,
    pub view: TextureView,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    _live: Option<LiveToken>,
}

impl GpuTexture {
    pub fn new(
        device: &Device,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: TextureUsages,
        label: &str,
        live: Option<LiveToken>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            id: TextureId::next(),
            texture,
            view,
            format,
            width,
            height,
            _live: live,
        }
    }

    pub fn render_target_usage() -> TextureUsages {
        TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_SRC
    }
}

impl BackendTexture for GpuTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}
