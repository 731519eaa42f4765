//! Run configuration record
//!
//! A [`Config`] holds hyperparameters and run metadata as JSON values.
//! Updates merge: a later value for a key replaces the earlier one. A config
//! bound to a [`Plotter`] pushes every update to its text panel.
//!
//! # Example
//!
//! ```
//! use mlogger::config::Config;
//!
//! let mut config = Config::new();
//! config.set("learning_rate", 1e-3_f64);
//! config.update([("epochs", 10), ("batch_size", 32)]);
//! config.set("learning_rate", 1e-4_f64);
//!
//! assert_eq!(config.get("learning_rate"), Some(&serde_json::json!(1e-4)));
//! assert_eq!(config.len(), 3);
//! ```


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::date_and_time;
use crate::error::{MetricError, Result};
use crate::plot::Plotter;
use crate::state::NodeState;

/// Variant tag of a serialized [`Config`]
pub const CONFIG_KIND: &str = "config";

/// Host name from `HOSTNAME` or `/etc/hostname`, null when neither is set.
fn hostname() -> Value {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map_or(Value::Null, Value::from)
}

#[derive(Serialize, Deserialize)]
struct ConfigFields {
    entries: Map<String, Value>,
    #[serde(default)]
    plot_title: Option<String>,
}

/// Key/value record with merge updates.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: Map<String, Value>,
    plot_title: Option<String>,
    plotter: Option<Plotter>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config pre-filled with information about the current process:
    /// `date_and_time`, `mlogger_version`, `command_line`, `pid`, `cwd`,
    /// `hostname`.
    pub fn with_general_info() -> Self {
        let mut config = Self::new();
        config.update_general_info();
        config
    }

    /// Record information about the current process.
    pub fn update_general_info(&mut self) {
        let command_line = std::env::args().collect::<Vec<_>>().join(" ");
        let cwd = std::env::current_dir()
            .map(|p| Value::from(p.display().to_string()))
            .unwrap_or(Value::Null);
        let pid = std::process::id();

        tracing::info!(pid, command_line = %command_line, "collected general run info");
        self.update([
            ("date_and_time", Value::from(date_and_time())),
            ("mlogger_version", Value::from(env!("CARGO_PKG_VERSION"))),
            ("command_line", Value::from(command_line)),
            ("pid", Value::from(pid)),
            ("cwd", cwd),
            ("hostname", hostname()),
        ]);
    }

    /// Set one entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let entry: (String, Value) = (key.into(), value.into());
        self.update([entry]);
    }

    /// Merge entries; later keys overwrite earlier ones.
    pub fn update<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let changed: Map<String, Value> =
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if changed.is_empty() {
            return;
        }
        if let (Some(plotter), Some(title)) = (&self.plotter, &self.plot_title) {
            plotter.push_text(title, &changed);
        }
        self.entries.extend(changed);
    }

    /// Merge the fields of any serializable struct.
    pub fn update_from<T: Serialize>(&mut self, record: &T) -> Result<()> {
        match serde_json::to_value(record)? {
            Value::Object(map) => {
                self.update(map);
                Ok(())
            }
            other => Err(MetricError::MalformedState {
                kind: CONFIG_KIND.to_string(),
                message: format!("expected an object of entries, got {other}"),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// All entries in insertion order
    #[must_use]
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn plot_title(&self) -> Option<&str> {
        self.plot_title.as_deref()
    }

    #[must_use]
    pub fn plotter(&self) -> Option<&Plotter> {
        self.plotter.as_ref()
    }

    /// Bind to a text panel and push the current entries to it.
    pub fn plot_on(&mut self, plotter: &Plotter, title: impl Into<String>) {
        let title = title.into();
        if !self.entries.is_empty() {
            plotter.push_text(&title, &self.entries);
        }
        self.plot_title = Some(title);
        self.plotter = Some(plotter.clone());
    }

    /// Rebind under the stored title, if there is one and the config is
    /// not already bound to `plotter`.
    pub fn replot_on(&mut self, plotter: &Plotter) -> bool {
        if self.plotter.as_ref().is_some_and(|p| p.ptr_eq(plotter)) {
            return false;
        }
        match self.plot_title.clone() {
            Some(title) => {
                self.plot_on(plotter, title);
                true
            }
            None => false,
        }
    }

    pub fn unplot(&mut self) {
        self.plotter = None;
    }

    pub fn state_dict(&self) -> Result<NodeState> {
        NodeState::new(CONFIG_KIND).with_fields(&ConfigFields {
            entries: self.entries.clone(),
            plot_title: self.plot_title.clone(),
        })
    }

    /// Replace entries and title with a saved state. The binding is kept.
    pub fn load_state_dict(&mut self, state: &NodeState) -> Result<()> {
        state.expect_kind(CONFIG_KIND)?;
        let fields: ConfigFields = state.fields_as()?;
        self.entries = fields.entries;
        self.plot_title = fields.plot_title;
        Ok(())
    }

    pub fn from_state(state: &NodeState) -> Result<Self> {
        let mut config = Self::new();
        config.load_state_dict(state)?;
        Ok(config)
    }
}
