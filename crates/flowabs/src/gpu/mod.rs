pub mod backend;
pub mod context;
pub mod fullscreen_quad;
pub mod pipeline;
pub mod render_target;
pub mod uniforms;

pub use backend::WgpuBackend;
pub use context::GpuContext;
pub use pipeline::StagePipeline;
pub use render_target::GpuTexture;
pub use uniforms::{StageUniforms, UniformBuffer};
