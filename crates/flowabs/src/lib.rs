//! Flow-based image abstraction (FlowAbs) as a chain of fullscreen fragment
//! passes: tangent flow estimation, oriented bilateral filtering, DoG / FDoG
//! edges, soft color quantization and flow-guided smoothing.
//!
//! Everything above the backend is generic over [`backend::RenderBackend`].
//! [`gpu::WgpuBackend`] renders with wgpu; [`cpu::CpuBackend`] evaluates the
//! same kernels per pixel and is what the tests run on.

pub mod backend;
pub mod cpu;
pub mod effect;
pub mod error;
pub mod flowabs;
pub mod gpu;
pub mod graph;
pub mod image;
pub mod noise;
pub mod params;
pub mod preset;
pub mod queue;
pub mod settings;
pub mod shader;
pub mod stage;
pub mod target;

pub use error::{ErrorClass, FlowAbsError, Result};
