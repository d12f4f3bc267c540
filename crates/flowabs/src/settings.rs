use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    Gpu,
    Cpu,
}

/// Host preferences, persisted as JSON under the user config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub version: u32,
    #[serde(default = "default_backend")]
    pub backend: BackendChoice,
    #[serde(default = "default_effect")]
    pub default_effect: String,
    #[serde(default)]
    pub edge_color: [f32; 3],
}

fn default_backend() -> BackendChoice {
    BackendChoice::Gpu
}

fn default_effect() -> String {
    "FlowAbs".to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            backend: default_backend(),
            default_effect: default_effect(),
            edge_color: [0.0, 0.0, 0.0],
        }
    }
}

impl SettingsConfig {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flowabs").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) {
        if let Some(path) = Self::path() {
            self.save_to(&path);
        }
    }

    /// Missing or unreadable files give the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed settings {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = std::fs::write(path, json) {
                log::warn!("Failed to save settings to {}: {e}", path.display());
            }
        }
    }
}
