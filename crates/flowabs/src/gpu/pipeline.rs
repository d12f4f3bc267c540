use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BufferBindingType, ColorTargetState, Device, FragmentState, MultisampleState,
    PipelineCompilationOptions, PipelineLayoutDescriptor, PrimitiveState, RenderPipeline,
    SamplerBindingType, ShaderModule, ShaderStages, TextureFormat, TextureSampleType,
    TextureViewDimension, VertexState,
};

use super::render_target::texture_format;
use super::uniforms::{StageUniforms, UniformBuffer};
use crate::backend::PixelFormat;
use crate::shader::compiler::compile_stage;
use crate::stage::StageKind;

/// Compiled program for one stage: a pipeline per target format, sharing a
/// bind group layout and the stage's own uniform buffer.
pub struct StagePipeline {
    pub kind: StageKind,
    pub pipelines: [RenderPipeline; 2],
    pub bind_group_layout: BindGroupLayout,
    pub uniforms: UniformBuffer,
}

impl StagePipeline {
    pub fn new(device: &Device, kind: StageKind, width: u32, height: u32) -> Self {
        let label = format!("flowabs-{kind}");
        let bind_group_layout = Self::create_bind_group_layout(device, kind, &label);
        let module = compile_stage(device, kind, width, height);
        let pipelines = [PixelFormat::Rgba8Unorm, PixelFormat::Rgba16Float].map(|format| {
            Self::create_pipeline(
                device,
                &label,
                texture_format(format),
                &bind_group_layout,
                &module,
            )
        });
        let uniforms = UniformBuffer::new(device, &format!("{label}-uniforms"));

        Self {
            kind,
            pipelines,
            bind_group_layout,
            uniforms,
        }
    }

    pub fn pipeline_for(&self, format: PixelFormat) -> &RenderPipeline {
        &self.pipelines[format.index()]
    }

    fn create_bind_group_layout(device: &Device, kind: StageKind, label: &str) -> BindGroupLayout {
        let mut entries = vec![uniform_entry(0), sampler_entry(1), tex_entry(2)];
        if kind.input_count() == 2 {
            entries.push(tex_entry(3));
        }
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&format!("{label}-bgl")),
            entries: &entries,
        })
    }

    fn create_pipeline(
        device: &Device,
        label: &str,
        format: TextureFormat,
        bind_group_layout: &BindGroupLayout,
        shader_module: &ShaderModule,
    ) -> RenderPipeline {
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{label}-layout")),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label}-{format:?}")),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: shader_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

fn uniform_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: std::num::NonZeroU64::new(std::mem::size_of::<StageUniforms>() as u64),
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    }
}

fn tex_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}
