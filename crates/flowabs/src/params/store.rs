use super::types::{ParamDef, ParamValue};
use crate::error::{FlowAbsError, Result};

/// Ordered parameter list of one effect. Index order is the order a UI
/// presents the controls in.
#[derive(Debug, Clone)]
pub struct ParamStore {
    owner: String,
    defs: Vec<ParamDef>,
    values: Vec<ParamValue>,
}

impl ParamStore {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            defs: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn load_from_defs(&mut self, defs: &[ParamDef]) {
        self.defs = defs.to_vec();
        self.values = defs.iter().map(ParamDef::default_value).collect();
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    pub fn def(&self, index: usize) -> Result<&ParamDef> {
        self.defs.get(index).ok_or_else(|| self.unknown(index))
    }

    pub fn get(&self, index: usize) -> Result<ParamValue> {
        self.values.get(index).copied().ok_or_else(|| self.unknown(index))
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.defs.iter().position(|d| d.name() == name)
    }

    /// Store `value`, clamped into range. Returns what was stored.
    pub fn set(&mut self, index: usize, value: ParamValue) -> Result<ParamValue> {
        let def = self.def(index)?;
        let stored = def.constrain(value)?;
        if stored.as_f32() != value.as_f32() {
            log::warn!(
                "{}: {} = {} is outside [{}, {}], clamped to {}",
                self.owner,
                def.name(),
                value,
                def.min_value(),
                def.max_value(),
                stored
            );
        }
        self.values[index] = stored;
        Ok(stored)
    }

    pub fn reset(&mut self, index: usize) -> Result<ParamValue> {
        let value = self.def(index)?.default_value();
        self.values[index] = value;
        Ok(value)
    }

    fn unknown(&self, index: usize) -> FlowAbsError {
        FlowAbsError::UnknownParam {
            effect: self.owner.clone(),
            index,
        }
    }
}
