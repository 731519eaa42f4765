//! Append-only metric history
//!
//! A [`History`] stores `(index, value)` points for one metric. The index
//! source is fixed at construction by an explicit [`IndexingMode`]:
//!
//! - **Time**: seconds elapsed since the history was created. Implicit
//!   indexes are strictly increasing.
//! - **Step**: an integer-valued counter, `last_index + 1` (or `0` when
//!   empty).
//!
//! Indexes are non-decreasing in both modes; an explicit index lower than
//! the last logged one is rejected.


use serde::{Deserialize, Serialize};

use crate::clock::now_secs;
use crate::error::{MetricError, Result};
use crate::state::float;

/// Source of history indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    /// Elapsed wall-clock seconds since start
    Time,
    /// Discrete step counter
    Step,
}

impl IndexingMode {
    /// Axis label used for plots of this mode.
    pub fn axis_label(self) -> Option<&'static str> {
        match self {
            IndexingMode::Time => Some("Time (s)"),
            IndexingMode::Step => None,
        }
    }
}

impl std::fmt::Display for IndexingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexingMode::Time => write!(f, "time"),
            IndexingMode::Step => write!(f, "step"),
        }
    }
}

/// Serializable snapshot of a [`History`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    pub indexing_mode: IndexingMode,
    #[serde(with = "float")]
    pub start_reference: f64,
    #[serde(with = "float::vec")]
    pub indices: Vec<f64>,
    #[serde(with = "float::vec")]
    pub values: Vec<f64>,
}

/// Ordered log of `(index, value)` points.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    mode: IndexingMode,
    start_reference: f64,
    indices: Vec<f64>,
    values: Vec<f64>,
}

impl History {
    /// Create an empty history.
    ///
    /// Time mode records the current wall-clock time as start reference;
    /// Step mode starts at `0`.
    pub fn new(mode: IndexingMode) -> Self {
        let start_reference = match mode {
            IndexingMode::Time => now_secs(),
            IndexingMode::Step => 0.0,
        };
        Self { mode, start_reference, indices: Vec::new(), values: Vec::new() }
    }

    /// Indexing mode fixed at construction
    pub fn mode(&self) -> IndexingMode {
        self.mode
    }

    /// Start reference (Unix seconds in Time mode, `0` in Step mode)
    pub fn start_reference(&self) -> f64 {
        self.start_reference
    }

    /// Next index according to the indexing mode. Does not mutate state.
    pub fn time(&self) -> f64 {
        match (self.mode, self.indices.last()) {
            (IndexingMode::Time, last) => {
                let elapsed = now_secs() - self.start_reference;
                match last {
                    Some(&last) if elapsed <= last => next_after(last),
                    _ => elapsed,
                }
            }
            (IndexingMode::Step, Some(&last)) => last + 1.0,
            (IndexingMode::Step, None) => 0.0,
        }
    }

    /// Append a point. A missing index defaults to [`History::time`].
    ///
    /// Returns the index actually used.
    pub fn log(&mut self, index: Option<f64>, value: f64) -> Result<f64> {
        let index = match index {
            Some(index) => {
                self.check_index(index)?;
                index
            }
            None => self.time(),
        };
        self.indices.push(index);
        self.values.push(value);
        Ok(index)
    }

    /// Whether `index` may be logged next: strictly above the last index in
    /// Time mode, not below it in Step mode.
    pub fn check_index(&self, index: f64) -> Result<()> {
        let Some(last) = self.last_index() else {
            return if index.is_nan() {
                Err(MetricError::NonMonotonicIndex { last: f64::NEG_INFINITY, index })
            } else {
                Ok(())
            };
        };
        // comparisons with NaN are false
        let accepted = match self.mode {
            IndexingMode::Time => index > last,
            IndexingMode::Step => index >= last,
        };
        if accepted {
            Ok(())
        } else {
            Err(MetricError::NonMonotonicIndex { last, index })
        }
    }

    /// Logged indexes
    pub fn indices(&self) -> &[f64] {
        &self.indices
    }

    /// Logged values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over `(index, value)` points in logging order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Most recently logged value
    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Most recently logged index
    pub fn last_index(&self) -> Option<f64> {
        self.indices.last().copied()
    }

    /// Snapshot for serialization.
    pub fn state(&self) -> HistoryState {
        HistoryState {
            indexing_mode: self.mode,
            start_reference: self.start_reference,
            indices: self.indices.clone(),
            values: self.values.clone(),
        }
    }

    /// Replace this history with a snapshot.
    pub fn load_state(&mut self, state: &HistoryState) -> Result<()> {
        if state.indices.len() != state.values.len() {
            return Err(MetricError::MalformedState {
                kind: "history".to_string(),
                message: format!(
                    "{} indices for {} values",
                    state.indices.len(),
                    state.values.len()
                ),
            });
        }
        self.mode = state.indexing_mode;
        self.start_reference = state.start_reference;
        self.indices = state.indices.clone();
        self.values = state.values.clone();
        Ok(())
    }

    /// Build a history from a snapshot.
    pub fn from_state(state: &HistoryState) -> Result<Self> {
        let mut history = Self::new(state.indexing_mode);
        history.load_state(state)?;
        Ok(history)
    }
}

/// A value just above `last`, relative to its magnitude.
fn next_after(last: f64) -> f64 {
    let step = f64::EPSILON * last.abs().max(1.0);
    last + step
}
