//! Per-title text panel with merge-until-acknowledged delivery

use std::collections::BTreeMap;

use serde_json::Value;

use super::series::FlushReport;
use super::sink::{Sink, SinkError, WindowHandle, WindowKind, WindowOptions};

/// Text panel: a lazily created sink handle and a merged key/value buffer.
///
/// A later update for a key overwrites the pending value for that key.
#[derive(Debug, Clone, Default)]
pub struct TextWindow {
    handle: Option<WindowHandle>,
    entries: BTreeMap<String, Value>,
}

impl TextWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<&WindowHandle> {
        self.handle.as_ref()
    }

    /// Merge entries into the pending buffer.
    pub fn merge<'a>(&mut self, entries: impl IntoIterator<Item = (&'a String, &'a Value)>) {
        for (key, value) in entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Number of pending keys
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Pending entries rendered as one line per key, sorted by key.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}: {s}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("<br />")
    }

    /// Deliver the pending entries, clearing them only on success.
    pub fn flush(
        &mut self,
        sink: &mut dyn Sink,
        title: &str,
        options: &WindowOptions,
        errors: &mut Vec<SinkError>,
    ) -> FlushReport {
        let mut report = FlushReport::default();

        if self.handle.is_none() {
            match sink.create_window(title, WindowKind::Text, options) {
                Ok(handle) => {
                    tracing::debug!(title, handle = %handle, "created text window");
                    self.handle = Some(handle);
                }
                Err(e) => {
                    report.failures += 1;
                    errors.push(e);
                }
            }
        }

        if let Some(handle) = self.handle.as_ref() {
            if !self.entries.is_empty() {
                match sink.write_text(handle, &self.render()) {
                    Ok(()) => {
                        report.delivered += self.entries.len();
                        self.entries.clear();
                    }
                    Err(e) => {
                        report.failures += 1;
                        errors.push(e);
                    }
                }
            }
        }

        report.pending = self.pending();
        report
    }
}
