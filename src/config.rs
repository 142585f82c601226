use anyhow::{bail, Context, Result};
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Per-category description of the overlay shown while that category has
/// at least one registered process.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScreenDefinition {
    pub widget: String,
    #[serde(default = "ScreenDefinition::default_z_order")]
    pub z_order: i32,
    #[serde(default = "ScreenDefinition::default_hold_secs")]
    pub hold_secs: f64,
    #[serde(default = "ScreenDefinition::default_block_input")]
    pub block_input: bool,
    #[serde(default = "ScreenDefinition::default_save_performance")]
    pub save_performance: bool,
}

impl ScreenDefinition {
    pub fn new(widget: impl Into<String>) -> Self {
        Self {
            widget: widget.into(),
            z_order: Self::default_z_order(),
            hold_secs: Self::default_hold_secs(),
            block_input: Self::default_block_input(),
            save_performance: Self::default_save_performance(),
        }
    }

    const fn default_z_order() -> i32 {
        100
    }

    const fn default_hold_secs() -> f64 {
        2.0
    }

    const fn default_block_input() -> bool {
        true
    }

    const fn default_save_performance() -> bool {
        true
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoadingConfig {
    #[serde(default)]
    pub screens: HashMap<String, ScreenDefinition>,
    #[serde(default)]
    pub observers: Vec<String>,
    #[serde(default = "LoadingConfig::default_hold_screens")]
    pub hold_screens: bool,
    #[serde(default)]
    pub force_refresh: bool,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            screens: HashMap::new(),
            observers: Vec::new(),
            hold_screens: Self::default_hold_screens(),
            force_refresh: false,
        }
    }
}

impl LoadingConfig {
    const fn default_hold_screens() -> bool {
        true
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("[loading] config load error: {err:?}; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (tag, screen) in &self.screens {
            if tag.trim().is_empty() {
                bail!("screen entry has an empty category tag");
            }
            if screen.widget.trim().is_empty() {
                bail!("screen '{tag}' has an empty widget name");
            }
            if screen.z_order < 0 {
                bail!("screen '{tag}' has negative z_order {}", screen.z_order);
            }
            if !screen.hold_secs.is_finite() || screen.hold_secs < 0.0 {
                bail!("screen '{tag}' has invalid hold_secs {}", screen.hold_secs);
            }
        }
        for name in &self.observers {
            if name.trim().is_empty() {
                bail!("observers list contains an empty name");
            }
        }
        Ok(())
    }

    /// Observer enable-list semantics: an empty list enables every observer
    /// the host registers.
    pub fn observer_enabled(&self, name: &str) -> bool {
        self.observers.is_empty() || self.observers.iter().any(|entry| entry == name)
    }
}
