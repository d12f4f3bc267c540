use bytemuck::{Pod, Zeroable};
use wgpu::{Buffer, Device, Queue};

/// Per-stage uniforms packed for GPU consumption (80 bytes).
/// Must be kept in sync with the WGSL `StageUniforms` struct in `shader::library`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct StageUniforms {
    pub sigma: f32,
    pub sigma_d: f32,
    pub sigma_r: f32,
    pub sigma_e: f32,
    pub sigma_m: f32,
    pub tau: f32,
    pub phi: f32,
    pub phi_q: f32,
    // 32 bytes
    pub num_bins: i32,
    pub pass_index: u32,
    pub _pad0: [f32; 2],
    // 48 bytes
    pub edge_color: [f32; 4],
    // 64 bytes
    pub src_scale: [f32; 2],
    pub src_offset: [f32; 2],
    // 80 bytes
}

impl Default for StageUniforms {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            sigma_d: 3.0,
            sigma_r: 4.25,
            sigma_e: 1.0,
            sigma_m: 3.0,
            tau: 0.99,
            phi: 2.0,
            phi_q: 3.4,
            num_bins: 8,
            pass_index: 0,
            _pad0: [0.0; 2],
            edge_color: [0.0, 0.0, 0.0, 1.0],
            src_scale: [1.0, 1.0],
            src_offset: [0.0, 0.0],
        }
    }
}

/// GPU-side copy of one stage's uniform block.
pub struct UniformBuffer {
    pub buffer: Buffer,
}

impl UniformBuffer {
    pub fn new(device: &Device, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<StageUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer }
    }

    pub fn update(&self, queue: &Queue, uniforms: &StageUniforms) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniforms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_uniforms_size_80() {
        assert_eq!(std::mem::size_of::<StageUniforms>(), 80);
    }

    #[test]
    fn edge_color_is_16_byte_aligned() {
        let u = StageUniforms::default();
        let base = &u as *const StageUniforms as usize;
        let field = &u.edge_color as *const [f32; 4] as usize;
        assert_eq!((field - base) % 16, 0);
        assert_eq!(field - base, 48);
    }

    #[test]
    fn stage_uniforms_zeroed() {
        let u: StageUniforms = bytemuck::Zeroable::zeroed();
        assert_eq!(u.sigma, 0.0);
        assert_eq!(u.num_bins, 0);
        assert_eq!(u.pass_index, 0);
        assert_eq!(u.edge_color, [0.0; 4]);
    }
}
