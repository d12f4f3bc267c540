//! The flow-based abstraction engine and its tunables.

pub mod engine;
pub mod settings;

pub use engine::{FlowAbsEngine, SharedEngine};
pub use settings::{
    BilateralParams, EdgeKind, EdgeParams, FlowAbsSettings, QuantizeFilter, QuantizeParams,
    Setting, SmoothKind, SmoothParams,
};
