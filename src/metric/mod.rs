//! Metrics
//!
//! A [`Metric`] is either a [`LeafMetric`] holding one typed value and its
//! history, or a [`ParentWrapper`] grouping leaves that are updated together.
//!
//! Leaf kinds:
//! - `Simple` - last value
//! - `Timer` - seconds elapsed since reset
//! - `Average` - weighted mean
//! - `Sum` - weighted total
//! - `Maximum` / `Minimum` - running extremum
//! - `Dynamic` - result of a bound function
//!
//! Only leaves are logged and plotted. Everything that differs between
//! leaves and wrappers goes through [`Metric::visit_leaves`] and
//! [`Metric::visit_leaves_mut`].

mod builder;
mod leaf;
mod wrapper;

#[cfg(test)]
mod tests;

pub use builder::MetricBuilder;
pub use leaf::{Hook, LeafMetric, MetricValue};
pub use wrapper::ParentWrapper;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::plot::Plotter;
use crate::state::NodeState;

/// Tag given to metrics created without one
pub const DEFAULT_TAG: &str = "default";

/// Variant tag of a serialized [`ParentWrapper`]
pub const WRAPPER_KIND: &str = "parent_wrapper";

/// Kind of a leaf metric, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Simple,
    Timer,
    Average,
    Sum,
    Maximum,
    Minimum,
    Dynamic,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Simple,
        MetricKind::Timer,
        MetricKind::Average,
        MetricKind::Sum,
        MetricKind::Maximum,
        MetricKind::Minimum,
        MetricKind::Dynamic,
    ];

    /// Variant tag used in serialized state
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Simple => "simple",
            MetricKind::Timer => "timer",
            MetricKind::Average => "average",
            MetricKind::Sum => "sum",
            MetricKind::Maximum => "maximum",
            MetricKind::Minimum => "minimum",
            MetricKind::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MetricError::SerializationTypeMismatch { kind: s.to_string() })
    }
}

/// Key of a metric identity: lowercase `name` for the default tag,
/// lowercase `name_tag` otherwise.
pub fn name_id(name: &str, tag: &str) -> String {
    if tag == DEFAULT_TAG {
        name.to_lowercase()
    } else {
        format!("{name}_{tag}").to_lowercase()
    }
}

/// A leaf metric or a wrapper of leaves.
#[derive(Debug)]
pub enum Metric {
    Leaf(LeafMetric),
    Wrapper(ParentWrapper),
}

impl From<LeafMetric> for Metric {
    fn from(metric: LeafMetric) -> Self {
        Metric::Leaf(metric)
    }
}

impl From<ParentWrapper> for Metric {
    fn from(wrapper: ParentWrapper) -> Self {
        Metric::Wrapper(wrapper)
    }
}

impl Metric {
    /// Start building a leaf metric.
    pub fn builder(name: impl Into<String>) -> MetricBuilder {
        MetricBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Metric::Leaf(m) => m.name(),
            Metric::Wrapper(w) => w.name(),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Metric::Leaf(m) => m.tag(),
            Metric::Wrapper(w) => w.tag(),
        }
    }

    #[must_use]
    pub fn name_id(&self) -> String {
        name_id(self.name(), self.tag())
    }

    pub fn as_leaf(&self) -> Option<&LeafMetric> {
        match self {
            Metric::Leaf(m) => Some(m),
            Metric::Wrapper(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafMetric> {
        match self {
            Metric::Leaf(m) => Some(m),
            Metric::Wrapper(_) => None,
        }
    }

    pub fn as_wrapper(&self) -> Option<&ParentWrapper> {
        match self {
            Metric::Wrapper(w) => Some(w),
            Metric::Leaf(_) => None,
        }
    }

    pub fn as_wrapper_mut(&mut self) -> Option<&mut ParentWrapper> {
        match self {
            Metric::Wrapper(w) => Some(w),
            Metric::Leaf(_) => None,
        }
    }

    /// Call `f` with every leaf and its dotted path below `path`.
    ///
    /// A leaf is reported under `path`; a wrapper's children under
    /// `path.child`.
    pub fn visit_leaves<'a>(&'a self, path: &str, f: &mut dyn FnMut(String, &'a LeafMetric)) {
        match self {
            Metric::Leaf(m) => f(path.to_string(), m),
            Metric::Wrapper(w) => {
                for (name, child) in w.children() {
                    f(format!("{path}.{name}"), child);
                }
            }
        }
    }

    /// Mutable form of [`visit_leaves`](Self::visit_leaves); stops at the
    /// first error.
    pub fn visit_leaves_mut(
        &mut self,
        path: &str,
        f: &mut dyn FnMut(&str, &mut LeafMetric) -> Result<()>,
    ) -> Result<()> {
        match self {
            Metric::Leaf(m) => f(path, m),
            Metric::Wrapper(w) => {
                for (name, child) in w.children_mut() {
                    f(&format!("{path}.{name}"), child)?;
                }
                Ok(())
            }
        }
    }

    /// Call `f` with every leaf.
    pub fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut LeafMetric)) {
        match self {
            Metric::Leaf(m) => f(m),
            Metric::Wrapper(w) => {
                for (_, child) in w.children_mut() {
                    f(child);
                }
            }
        }
    }

    /// Reset every leaf.
    pub fn reset(&mut self) {
        self.for_each_leaf_mut(&mut |leaf| leaf.reset());
    }

    /// Log every leaf at `index`. Nothing is logged if any leaf would fail.
    pub fn log(&mut self, index: Option<f64>) -> Result<()> {
        self.check_log(index)?;
        self.visit_leaves_mut("", &mut |_, leaf| leaf.log(index).map(|_| ()))
    }

    pub fn check_log(&self, index: Option<f64>) -> Result<()> {
        match self {
            Metric::Leaf(m) => m.check_log(index),
            Metric::Wrapper(w) => w.check_log(index),
        }
    }

    /// Plotter of the first bound leaf
    #[must_use]
    pub fn plotter(&self) -> Option<&Plotter> {
        match self {
            Metric::Leaf(m) => m.plotter(),
            Metric::Wrapper(w) => w.children().find_map(|(_, child)| child.plotter()),
        }
    }

    /// Rebind every titled leaf to `plotter`.
    pub fn replot_on(&mut self, plotter: &Plotter) {
        self.for_each_leaf_mut(&mut |leaf| {
            leaf.replot_on(plotter);
        });
    }

    pub fn unplot(&mut self) {
        self.for_each_leaf_mut(&mut |leaf| leaf.unplot());
    }

    pub fn state_dict(&self) -> Result<NodeState> {
        match self {
            Metric::Leaf(m) => m.state_dict(),
            Metric::Wrapper(w) => w.state_dict(),
        }
    }

    /// Rebuild a leaf or wrapper from its tagged state.
    pub fn from_state(state: &NodeState) -> Result<Self> {
        if state.kind == WRAPPER_KIND {
            ParentWrapper::from_state(state).map(Metric::Wrapper)
        } else {
            LeafMetric::from_state(state).map(Metric::Leaf)
        }
    }
}
