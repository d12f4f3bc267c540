//! Selectable effects: a parameter list plus an `apply` that renders one frame.

pub mod flowabs_effect;
pub mod shader_effect;

use crossbeam_channel::Sender;

use crate::backend::RenderBackend;
use crate::error::{FlowAbsError, Result};
use crate::params::{ParamDef, ParamStore, ParamValue};
use crate::target::RenderTarget;

pub use flowabs_effect::{FlowAbsEffect, FlowAbsMode};
pub use shader_effect::ShaderEffect;

/// Sent to the listener after every parameter write or reset, carrying the
/// value actually stored (post-clamp).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamEvent {
    pub effect: String,
    pub index: usize,
    pub name: String,
    pub value: ParamValue,
}

/// Bookkeeping shared by every effect: display name, parameters and the
/// optional change listener.
pub struct EffectCore {
    pub name: String,
    pub params: ParamStore,
    listener: Option<Sender<ParamEvent>>,
}

impl EffectCore {
    pub fn new(name: &str, defs: &[ParamDef]) -> Self {
        let mut params = ParamStore::new(name);
        params.load_from_defs(defs);
        Self {
            name: name.to_string(),
            params,
            listener: None,
        }
    }

    fn notify(&self, index: usize, value: ParamValue) {
        let Some(tx) = &self.listener else {
            return;
        };
        let name = self
            .params
            .def(index)
            .map(|d| d.name().to_string())
            .unwrap_or_default();
        let event = ParamEvent {
            effect: self.name.clone(),
            index,
            name,
            value,
        };
        if tx.send(event).is_err() {
            log::debug!("{}: parameter listener disconnected", self.name);
        }
    }
}

pub trait Effect<B: RenderBackend> {
    fn core(&self) -> &EffectCore;
    fn core_mut(&mut self) -> &mut EffectCore;

    /// Create GPU resources for frames of `width` x `height`.
    fn init(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn apply(&mut self, backend: &mut B, src: &B::Texture, target: &RenderTarget<B>)
    -> Result<()>;

    /// Route the stored value of parameter `index` to whatever consumes it.
    fn bind_param(&mut self, index: usize, value: ParamValue) -> Result<()>;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn params(&self) -> &ParamStore {
        &self.core().params
    }

    /// Store (clamped), bind and notify. Returns the stored value.
    fn set_param(&mut self, index: usize, value: ParamValue) -> Result<ParamValue> {
        let stored = self.core_mut().params.set(index, value)?;
        self.bind_param(index, stored)?;
        self.core().notify(index, stored);
        Ok(stored)
    }

    fn set_param_by_name(&mut self, name: &str, value: ParamValue) -> Result<ParamValue> {
        let index = self.params().index_of(name).ok_or_else(|| {
            FlowAbsError::UnknownParamName {
                effect: self.name().to_string(),
                name: name.to_string(),
            }
        })?;
        self.set_param(index, value)
    }

    fn reset_param(&mut self, index: usize) -> Result<ParamValue> {
        let value = self.core_mut().params.reset(index)?;
        self.bind_param(index, value)?;
        self.core().notify(index, value);
        Ok(value)
    }

    fn reset_params(&mut self) -> Result<()> {
        for index in 0..self.params().len() {
            self.reset_param(index)?;
        }
        Ok(())
    }

    fn set_listener(&mut self, listener: Option<Sender<ParamEvent>>) {
        self.core_mut().listener = listener;
    }

    fn set_edge_color(&mut self, _rgb: [f32; 3]) -> Result<()> {
        Err(FlowAbsError::Unsupported {
            effect: self.name().to_string(),
            what: "edge color",
        })
    }
}
