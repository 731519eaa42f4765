//! Sink boundary: the external visualization backend

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sink-side identifier of a created window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub String);

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a window displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Line plot of (x, y) series, one per legend
    Series,
    /// Text panel
    Text,
}

/// Display options for a window.
///
/// The window title is owned by the plot cache and is passed to the sink
/// separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlabel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ylabel: Option<String>,
    /// Backend-specific options passed through unchanged
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl WindowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_xlabel(mut self, xlabel: impl Into<String>) -> Self {
        self.xlabel = Some(xlabel.into());
        self
    }

    #[must_use]
    pub fn with_ylabel(mut self, ylabel: impl Into<String>) -> Self {
        self.ylabel = Some(ylabel.into());
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Delivery failure reported by a sink.
///
/// Never returned past the plot cache: the cache keeps the undelivered data
/// and retries on the next flush.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Sink rejected the request: {0}")]
    Rejected(String),

    #[error("Unknown window: {0}")]
    UnknownWindow(WindowHandle),
}

/// External visualization backend.
///
/// None of these calls is assumed to succeed.
pub trait Sink {
    /// Create a window and return its handle.
    fn create_window(
        &mut self,
        title: &str,
        kind: WindowKind,
        options: &WindowOptions,
    ) -> Result<WindowHandle, SinkError>;

    /// Append points to the series named `legend` in a window.
    fn append_series(
        &mut self,
        handle: &WindowHandle,
        legend: Option<&str>,
        x: &[f64],
        y: &[f64],
    ) -> Result<(), SinkError>;

    /// Append text to a text window.
    fn write_text(&mut self, handle: &WindowHandle, text: &str) -> Result<(), SinkError>;

    /// Sink name for logging
    fn name(&self) -> &'static str {
        "Sink"
    }
}
