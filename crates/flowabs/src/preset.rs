use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::RenderBackend;
use crate::effect::Effect;
use crate::params::ParamValue;

/// Saved parameter values for one effect, keyed by parameter name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectPreset {
    pub effect: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub edge_color: Option<[f32; 3]>,
}

impl EffectPreset {
    /// Snapshot the current values of `effect`.
    pub fn capture<B: RenderBackend>(effect: &dyn Effect<B>) -> Self {
        let params = effect.params();
        Self {
            effect: effect.name().to_string(),
            params: params
                .defs()
                .iter()
                .zip(params.values())
                .map(|(def, value)| (def.name().to_string(), *value))
                .collect(),
            edge_color: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading preset {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing preset {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing preset {}", path.display()))
    }

    /// Write every stored value through `set_param`, so clamping and
    /// listener notifications apply. Names the effect does not know are
    /// skipped with a warning.
    pub fn apply_to<B: RenderBackend>(&self, effect: &mut dyn Effect<B>) -> Result<()> {
        if self.effect != effect.name() {
            log::warn!(
                "Preset for '{}' applied to '{}'",
                self.effect,
                effect.name()
            );
        }
        for (name, value) in &self.params {
            if effect.params().index_of(name).is_none() {
                log::warn!("{}: preset parameter '{name}' ignored", effect.name());
                continue;
            }
            effect.set_param_by_name(name, *value)?;
        }
        if let Some(rgb) = self.edge_color {
            effect.set_edge_color(rgb)?;
        }
        Ok(())
    }
}
