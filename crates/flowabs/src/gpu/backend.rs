use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindingResource, BufferDescriptor, BufferUsages, Device,
    ErrorFilter, Extent3d, Sampler, TextureUsages,
};

use super::context::GpuContext;
use super::pipeline::StagePipeline;
use super::render_target::GpuTexture;
use super::uniforms::StageUniforms;
use crate::backend::{LiveCounter, PixelFormat, RenderBackend};
use crate::error::{FlowAbsError, Result};
use crate::image::Image;
use crate::stage::StageKind;

/// wgpu renderer. Every draw is recorded and submitted on its own, so the
/// stage's uniform write lands right before the pass that reads it.
pub struct WgpuBackend {
    ctx: GpuContext,
    sampler: Sampler,
    live: LiveCounter,
}

impl WgpuBackend {
    pub fn new() -> Result<Self> {
        Ok(Self::with_context(GpuContext::new()?))
    }

    pub fn with_context(ctx: GpuContext) -> Self {
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("flowabs-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        Self {
            ctx,
            sampler,
            live: LiveCounter::default(),
        }
    }
}

impl RenderBackend for WgpuBackend {
    type Texture = GpuTexture;
    type Program = StagePipeline;

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        label: &str,
    ) -> Result<GpuTexture> {
        check_size(&self.ctx, width, height, label)?;
        let device = &self.ctx.device;
        let live = self.live.token();
        scoped(device, || {
            GpuTexture::new(
                device,
                width,
                height,
                format,
                GpuTexture::render_target_usage(),
                label,
                Some(live),
            )
        })
        .map_err(|reason| FlowAbsError::Texture {
            label: label.to_string(),
            reason,
        })
    }

    fn upload_texture(&mut self, image: &Image, format: PixelFormat, label: &str) -> Result<GpuTexture> {
        if format != PixelFormat::Rgba8Unorm {
            return Err(FlowAbsError::Texture {
                label: label.to_string(),
                reason: format!("uploads must be Rgba8Unorm, got {format:?}"),
            });
        }
        let (width, height) = (image.width(), image.height());
        check_size(&self.ctx, width, height, label)?;

        let device = &self.ctx.device;
        let texture = scoped(device, || {
            GpuTexture::new(
                device,
                width,
                height,
                format,
                TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                label,
                None,
            )
        })
        .map_err(|reason| FlowAbsError::Texture {
            label: label.to_string(),
            reason,
        })?;
        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.to_rgba8_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(texture)
    }

    fn create_program(&mut self, kind: StageKind, width: u32, height: u32) -> Result<StagePipeline> {
        log::debug!("Compiling stage {kind} at {width}x{height}");
        let device = &self.ctx.device;
        scoped(device, || StagePipeline::new(device, kind, width, height))
            .map_err(|reason| FlowAbsError::Compile { stage: kind, reason })
    }

    fn draw(
        &mut self,
        program: &StagePipeline,
        uniforms: &StageUniforms,
        inputs: &[&GpuTexture],
        target: &GpuTexture,
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

        program.uniforms.update(&self.ctx.queue, uniforms);

        let mut entries = vec![
            BindGroupEntry {
                binding: 0,
                resource: program.uniforms.buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&self.sampler),
            },
        ];
        for (i, input) in inputs.iter().enumerate() {
            entries.push(BindGroupEntry {
                binding: 2 + i as u32,
                resource: BindingResource::TextureView(&input.view),
            });
        }
        let bind_group = self.ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some(&format!("flowabs-{kind}-bg")),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("flowabs-draw"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("flowabs-{kind}")),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(program.pipeline_for(target.format));
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn read_texture(&mut self, texture: &GpuTexture) -> Result<Image> {
        if texture.format != PixelFormat::Rgba8Unorm {
            return Err(FlowAbsError::Readback(format!(
                "only Rgba8Unorm targets can be read back, got {:?}",
                texture.format
            )));
        }
        let (width, height) = (texture.width, texture.height);
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let device = &self.ctx.device;
        let staging = device.create_buffer(&BufferDescriptor {
            label: Some("flowabs-readback"),
            size: (padded_bytes_per_row * height) as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("flowabs-readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = crossbeam_channel::bounded(1);
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });

        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| FlowAbsError::Readback(e.to_string()))?;
        rx.try_recv()
            .map_err(|_| FlowAbsError::Readback("map callback did not run".into()))?
            .map_err(|e| FlowAbsError::Readback(e.to_string()))?;

        let data = {
            let view = staging.slice(..).get_mapped_range();
            let mut out = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
            for row in 0..height {
                let start = (row * padded_bytes_per_row) as usize;
                out.extend_from_slice(&view[start..start + unpadded_bytes_per_row as usize]);
            }
            out
        };
        staging.unmap();

        Ok(Image::from_rgba8_bytes(width, height, &data))
    }

    fn live_render_targets(&self) -> usize {
        self.live.count()
    }
}

fn check_size(ctx: &GpuContext, width: u32, height: u32, label: &str) -> Result<()> {
    let max = ctx.device.limits().max_texture_dimension_2d;
    if width == 0 || height == 0 || width > max || height > max {
        return Err(FlowAbsError::Texture {
            label: label.to_string(),
            reason: format!("invalid size {width}x{height} (max {max})"),
        });
    }
    Ok(())
}

/// Run `create` inside validation and out-of-memory error scopes, so a
/// failure comes back as an error instead of reaching the uncaptured-error
/// handler.
fn scoped<T>(device: &Device, create: impl FnOnce() -> T) -> std::result::Result<T, String> {
    device.push_error_scope(ErrorFilter::OutOfMemory);
    device.push_error_scope(ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(e) => Err(e.to_string()),
        None => Ok(value),
    }
}

/// Align `value` up to the next multiple of `alignment`.
fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}
