use wgpu::{Device, ShaderModule};

use super::library::stage_source;
use crate::gpu::fullscreen_quad::FULLSCREEN_TRIANGLE_VS;
use crate::stage::StageKind;

/// Compile one stage, vertex and fragment in a single module.
/// wgpu validates through naga; pipeline creation reports any error.
pub fn compile_stage(device: &Device, kind: StageKind, width: u32, height: u32) -> ShaderModule {
    let source = format!(
        "{}\n{}",
        FULLSCREEN_TRIANGLE_VS,
        stage_source(kind, width, height)
    );
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("flowabs-{kind}")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}
