//! Plotter configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sink::WindowOptions;
use crate::error::Result;

/// When buffered plot data is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Every push flushes its window
    #[default]
    Automatic,
    /// Data waits for an explicit flush
    Manual,
}

/// Plotter settings, loadable from YAML.
///
/// ```yaml
/// mode: manual
/// live: true
/// windows:
///   loss:
///     xlabel: Epoch
///     ylabel: Cross entropy
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterConfig {
    pub mode: FlushMode,
    /// Disable plotting after the first sink failure instead of retrying
    pub live: bool,
    /// Options applied when the window with that title is created
    pub windows: BTreeMap<String, WindowOptions>,
}

impl PlotterConfig {
    /// Automatic flushing, not live
    pub fn automatic() -> Self {
        Self::default()
    }

    /// Manual flushing, not live
    pub fn manual() -> Self {
        Self { mode: FlushMode::Manual, ..Self::default() }
    }

    #[must_use]
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    #[must_use]
    pub fn with_window(mut self, title: impl Into<String>, options: WindowOptions) -> Self {
        self.windows.insert(title.into(), options);
        self
    }

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
