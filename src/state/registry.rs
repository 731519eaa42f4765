//! Explicit variant-tag registry used to rebuild nodes from state

use std::collections::BTreeMap;

use super::NodeState;
use crate::config::{Config, CONFIG_KIND};
use crate::container::{Container, Node, CONTAINER_KIND};
use crate::error::{MetricError, Result};
use crate::metric::{LeafMetric, Metric, MetricKind, ParentWrapper, WRAPPER_KIND};

/// Builds a fresh node of one variant and loads `state` into it.
///
/// The registry is passed along so container factories can rebuild their
/// children through the same table.
pub type NodeFactory = fn(&NodeState, &StateRegistry) -> Result<Node>;

/// Maps variant tags to factories.
///
/// [`StateRegistry::default`] knows every variant this crate defines.
/// Callers can [`register`](StateRegistry::register) additional tags.
#[derive(Debug, Clone)]
pub struct StateRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl StateRegistry {
    /// Create a registry with no tags.
    pub fn empty() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// Register (or replace) the factory for a tag.
    pub fn register(&mut self, kind: impl Into<String>, factory: NodeFactory) -> &mut Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    /// Whether a tag is known.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Known tags in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Rebuild a node from its state.
    pub fn build(&self, state: &NodeState) -> Result<Node> {
        let factory = self
            .factories
            .get(&state.kind)
            .ok_or_else(|| MetricError::SerializationTypeMismatch { kind: state.kind.clone() })?;
        factory(state, self)
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in MetricKind::ALL {
            registry.register(kind.as_str(), build_leaf);
        }
        registry
            .register(WRAPPER_KIND, build_wrapper)
            .register(CONFIG_KIND, build_config)
            .register(CONTAINER_KIND, build_container);
        registry
    }
}

fn build_leaf(state: &NodeState, _registry: &StateRegistry) -> Result<Node> {
    Ok(Node::Metric(Metric::Leaf(LeafMetric::from_state(state)?)))
}

fn build_wrapper(state: &NodeState, _registry: &StateRegistry) -> Result<Node> {
    Ok(Node::Metric(Metric::Wrapper(ParentWrapper::from_state(state)?)))
}

fn build_config(state: &NodeState, _registry: &StateRegistry) -> Result<Node> {
    Ok(Node::Config(Config::from_state(state)?))
}

fn build_container(state: &NodeState, registry: &StateRegistry) -> Result<Node> {
    let mut container = Container::new();
    container.load_state_dict_with(state, registry)?;
    Ok(Node::Container(container))
}
