//! Parent wrapper: fans updates out to named leaf children

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::leaf::check_weight;
use super::{name_id, LeafMetric, MetricKind, DEFAULT_TAG, WRAPPER_KIND};
use crate::coerce::ToScalar;
use crate::error::{MetricError, Result};
use crate::plot::Plotter;
use crate::state::NodeState;

#[derive(Serialize, Deserialize)]
struct WrapperFields {
    name: String,
    tag: String,
    children: Map<String, Value>,
}

/// Group of leaf metrics updated together by child name.
///
/// The wrapper has no value or history of its own; `log` logs each child.
/// Children take the wrapper's tag when attached.
///
/// # Example
///
/// ```
/// use mlogger::metric::{MetricBuilder, ParentWrapper};
///
/// let mut obj = ParentWrapper::new("objective")
///     .with_child("loss", MetricBuilder::new("loss").average())
///     .unwrap()
///     .with_child("count", MetricBuilder::new("count").sum())
///     .unwrap();
///
/// obj.update_weighted([("loss", 1.0), ("count", 2.0)], 4.0).unwrap();
/// let values = obj.get().unwrap();
/// assert_eq!(values["loss"], 1.0);
/// assert_eq!(values["count"], 8.0);
/// ```
#[derive(Debug)]
pub struct ParentWrapper {
    name: String,
    tag: String,
    children: Vec<(String, LeafMetric)>,
}

impl ParentWrapper {
    /// Create an empty wrapper with the default tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tag: DEFAULT_TAG.to_string(), children: Vec::new() }
    }

    /// Set the tag of the wrapper and of every child.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        for (_, child) in &mut self.children {
            child.set_tag(&self.tag);
        }
        self
    }

    /// Builder form of [`add_child`](Self::add_child).
    pub fn with_child(mut self, name: impl Into<String>, metric: LeafMetric) -> Result<Self> {
        self.add_child(name, metric)?;
        Ok(self)
    }

    /// Attach a child under `name`, re-tagging it to the wrapper's tag.
    pub fn add_child(&mut self, name: impl Into<String>, mut metric: LeafMetric) -> Result<()> {
        let name = name.into();
        if self.children.iter().any(|(n, _)| *n == name) {
            return Err(MetricError::DuplicateRegistration { name, tag: self.tag.clone() });
        }
        metric.set_tag(&self.tag);
        self.children.push((name, metric));
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn name_id(&self) -> String {
        name_id(&self.name, &self.tag)
    }

    pub fn child(&self, name: &str) -> Result<&LeafMetric> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
            .ok_or_else(|| MetricError::UnknownChild { name: name.to_string() })
    }

    pub fn child_mut(&mut self, name: &str) -> Result<&mut LeafMetric> {
        self.children
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
            .ok_or_else(|| MetricError::UnknownChild { name: name.to_string() })
    }

    /// Children in attachment order
    pub fn children(&self) -> impl Iterator<Item = (&str, &LeafMetric)> {
        self.children.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = (&str, &mut LeafMetric)> {
        self.children.iter_mut().map(|(n, m)| (n.as_str(), m))
    }

    /// Update children by name with weight `1`.
    pub fn update<I, K, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToScalar,
    {
        self.update_weighted(values, 1.0)
    }

    /// Update children by name with a shared weight.
    ///
    /// Every name and value is checked before any child changes, so a bad
    /// entry leaves all children untouched.
    pub fn update_weighted<I, K, V>(&mut self, values: I, weight: f64) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToScalar,
    {
        check_weight(weight)?;
        let mut resolved = Vec::new();
        for (key, value) in values {
            let key = key.as_ref();
            let position = self
                .children
                .iter()
                .position(|(n, _)| n == key)
                .ok_or_else(|| MetricError::UnknownChild { name: key.to_string() })?;
            let child = &self.children[position].1;
            if child.kind() == MetricKind::Dynamic {
                return Err(MetricError::Unsupported {
                    name: child.name().to_string(),
                    kind: MetricKind::Dynamic.as_str(),
                    operation: "update with a value",
                });
            }
            resolved.push((position, value.to_scalar()?));
        }

        for (position, value) in resolved {
            self.children[position].1.update_weighted(value, weight)?;
        }
        Ok(())
    }

    /// Reset every child.
    pub fn reset(&mut self) {
        for (_, child) in &mut self.children {
            child.reset();
        }
    }

    /// Value of every child, keyed by child name.
    pub fn get(&self) -> Result<BTreeMap<String, f64>> {
        self.children.iter().map(|(name, child)| Ok((name.clone(), child.value()?))).collect()
    }

    /// Log every child at `index`.
    ///
    /// Every child is checked first, so a failure logs nothing.
    pub fn log(&mut self, index: Option<f64>) -> Result<()> {
        self.check_log(index)?;
        for (_, child) in &mut self.children {
            child.log(index)?;
        }
        Ok(())
    }

    pub fn check_log(&self, index: Option<f64>) -> Result<()> {
        self.children.iter().try_for_each(|(_, child)| child.check_log(index))
    }

    /// Rebind every titled child to `plotter`.
    pub fn replot_on(&mut self, plotter: &Plotter) {
        for (_, child) in &mut self.children {
            child.replot_on(plotter);
        }
    }

    pub fn unplot(&mut self) {
        for (_, child) in &mut self.children {
            child.unplot();
        }
    }

    pub fn state_dict(&self) -> Result<NodeState> {
        let mut children = Map::new();
        for (name, child) in &self.children {
            children.insert(name.clone(), serde_json::to_value(child.state_dict()?)?);
        }
        NodeState::new(WRAPPER_KIND).with_fields(&WrapperFields {
            name: self.name.clone(),
            tag: self.tag.clone(),
            children,
        })
    }

    /// Build a wrapper and its children from a tagged state.
    pub fn from_state(state: &NodeState) -> Result<Self> {
        state.expect_kind(WRAPPER_KIND)?;
        let fields: WrapperFields = state.fields_as()?;

        let mut wrapper = Self::new(fields.name).with_tag(fields.tag);
        for (name, child_state) in fields.children {
            let child_state: NodeState = serde_json::from_value(child_state)?;
            wrapper.add_child(name, LeafMetric::from_state(&child_state)?)?;
        }
        Ok(wrapper)
    }
}
