pub mod compiler;
pub mod library;

pub use library::stage_source;
