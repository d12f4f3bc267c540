use thiserror::Error;

use crate::stage::StageKind;

pub type Result<T, E = FlowAbsError> = std::result::Result<T, E>;

/// Broad classes of failure, used by hosts to decide whether an effect
/// instance can keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Programming error in the orchestration layer. Never recoverable.
    Configuration,
    /// GPU resource creation or transfer failed.
    Resource,
    /// Operation issued in the wrong lifecycle state (e.g. apply before init).
    State,
}

#[derive(Debug, Error)]
pub enum FlowAbsError {
    #[error("stage {stage} takes {expected} texture input(s), got {got}")]
    InputCount {
        stage: StageKind,
        expected: usize,
        got: usize,
    },

    #[error("bilateral pass must be 0 or 1, got {0}")]
    InvalidPass(u32),

    #[error("stage {stage} has no uniform `{uniform}`")]
    UnknownUniform {
        stage: StageKind,
        uniform: &'static str,
    },

    #[error("stage {stage} would sample the render target it is drawing into")]
    FeedbackLoop { stage: StageKind },

    #[error("{effect}: parameter index {index} out of range")]
    UnknownParam { effect: String, index: usize },

    #[error("{effect}: no parameter named `{name}`")]
    UnknownParamName { effect: String, name: String },

    #[error("parameter `{name}` is {expected}, got a {got} value")]
    ParamKind {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("effect index {0} out of range")]
    UnknownEffect(usize),

    #[error("{what} size {width}x{height} is empty")]
    InvalidSize {
        what: String,
        width: u32,
        height: u32,
    },

    #[error("{effect} does not support {what}")]
    Unsupported { effect: String, what: &'static str },

    #[error("{0} used before init")]
    NotInitialized(String),

    #[error("engine sized {expected:?} cannot serve {got:?}")]
    ResolutionMismatch {
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("GPU adapter unavailable: {0}")]
    Adapter(String),

    #[error("GPU device request failed: {0}")]
    Device(String),

    #[error("stage {stage} failed to compile: {reason}")]
    Compile { stage: StageKind, reason: String },

    #[error("texture {label}: {reason}")]
    Texture { label: String, reason: String },

    #[error("readback failed: {0}")]
    Readback(String),
}

impl FlowAbsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FlowAbsError::InputCount { .. }
            | FlowAbsError::InvalidPass(_)
            | FlowAbsError::UnknownUniform { .. }
            | FlowAbsError::FeedbackLoop { .. }
            | FlowAbsError::UnknownParam { .. }
            | FlowAbsError::UnknownParamName { .. }
            | FlowAbsError::ParamKind { .. }
            | FlowAbsError::UnknownEffect(_)
            | FlowAbsError::InvalidSize { .. }
            | FlowAbsError::Unsupported { .. } => ErrorClass::Configuration,
            FlowAbsError::Adapter(_)
            | FlowAbsError::Device(_)
            | FlowAbsError::Compile { .. }
            | FlowAbsError::Texture { .. }
            | FlowAbsError::Readback(_) => ErrorClass::Resource,
            FlowAbsError::NotInitialized(_) | FlowAbsError::ResolutionMismatch { .. } => {
                ErrorClass::State
            }
        }
    }
}
