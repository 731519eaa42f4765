//! Hierarchical container of metrics, configs and nested containers
//!
//! A [`Container`] is an ordered namespace. Children are addressed by name;
//! metrics can also be registered under their identity key
//! ([`name_id`](crate::metric::name_id)) and looked up by `(name, tag)`.
//!
//! Bulk operations (`reset`, `log`, `log_with_tag`, `plot_on`) reach every
//! leaf metric of the subtree. A whole tree serializes to one
//! [`NodeState`] and is rebuilt through the [`StateRegistry`].
//!
//! # Example
//!
//! ```
//! use mlogger::container::Container;
//! use mlogger::metric::MetricBuilder;
//!
//! # fn main() -> mlogger::Result<()> {
//! let mut xp = Container::new();
//! xp.register(MetricBuilder::new("loss").tag("train").average())?;
//! xp.register(MetricBuilder::new("acc").tag("train").maximum())?;
//!
//! if let Some(loss) = xp.metric_mut("loss", "train")?.as_leaf_mut() {
//!     loss.update(0.5)?;
//! }
//! xp.log_with_tag("train", None)?;
//!
//! let names: Vec<String> = xp.named_metrics().into_iter().map(|(n, _)| n).collect();
//! assert_eq!(names, vec!["loss_train", "acc_train"]);
//! # Ok(())
//! # }
//! ```


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{MetricError, Result};
use crate::metric::{LeafMetric, Metric, ParentWrapper};
use crate::plot::Plotter;
use crate::state::{NodeState, StateRegistry};

/// Variant tag of a serialized [`Container`]
pub const CONTAINER_KIND: &str = "container";

/// Separator between path segments in [`Container::named_metrics`]
pub const PATH_SEPARATOR: char = '.';

/// A child of a container.
#[derive(Debug)]
pub enum Node {
    Metric(Metric),
    Config(Config),
    Container(Container),
}

impl From<Metric> for Node {
    fn from(metric: Metric) -> Self {
        Node::Metric(metric)
    }
}

impl From<LeafMetric> for Node {
    fn from(metric: LeafMetric) -> Self {
        Node::Metric(Metric::Leaf(metric))
    }
}

impl From<ParentWrapper> for Node {
    fn from(wrapper: ParentWrapper) -> Self {
        Node::Metric(Metric::Wrapper(wrapper))
    }
}

impl From<Config> for Node {
    fn from(config: Config) -> Self {
        Node::Config(config)
    }
}

impl From<Container> for Node {
    fn from(container: Container) -> Self {
        Node::Container(container)
    }
}

impl Node {
    pub fn as_metric(&self) -> Option<&Metric> {
        match self {
            Node::Metric(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_metric_mut(&mut self) -> Option<&mut Metric> {
        match self {
            Node::Metric(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_config(&self) -> Option<&Config> {
        match self {
            Node::Config(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_config_mut(&mut self) -> Option<&mut Config> {
        match self {
            Node::Config(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Node::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn state_dict(&self) -> Result<NodeState> {
        match self {
            Node::Metric(m) => m.state_dict(),
            Node::Config(c) => c.state_dict(),
            Node::Container(c) => c.state_dict(),
        }
    }

    /// Bind every titled part of this node to `plotter`.
    pub fn plot_on(&mut self, plotter: &Plotter) {
        match self {
            Node::Metric(m) => m.replot_on(plotter),
            Node::Config(c) => {
                c.replot_on(plotter);
            }
            Node::Container(c) => c.plot_on(plotter),
        }
    }

    pub fn unplot(&mut self) {
        match self {
            Node::Metric(m) => m.unplot(),
            Node::Config(c) => c.unplot(),
            Node::Container(c) => c.unplot(),
        }
    }

    /// Plotter this node, or the first bound part of it, is bound to.
    #[must_use]
    pub fn plotter(&self) -> Option<&Plotter> {
        match self {
            Node::Metric(m) => m.plotter(),
            Node::Config(c) => c.plotter(),
            Node::Container(c) => c
                .plotter
                .as_ref()
                .or_else(|| c.children().find_map(Node::plotter)),
        }
    }

    /// Take over the display binding of the node this one replaces.
    ///
    /// A leaf or config without a title of its own is bound under the
    /// title (and explicit legend) of the one it replaces.
    fn adopt_binding(&mut self, old: &Node) {
        let Some(plotter) = old.plotter() else {
            return;
        };
        match (self, old) {
            (Node::Metric(Metric::Leaf(new)), Node::Metric(Metric::Leaf(old)))
                if new.plot_title().is_none() =>
            {
                if let Some(title) = old.plot_title() {
                    new.plot_on(plotter, title, old.plot_legend());
                }
            }
            (Node::Config(new), Node::Config(old)) if new.plot_title().is_none() => {
                if let Some(title) = old.plot_title() {
                    new.plot_on(plotter, title);
                }
            }
            (new, _) => new.plot_on(plotter),
        }
    }
}

/// Ordered tree of metrics, configs and containers.
#[derive(Debug, Default)]
pub struct Container {
    children: Vec<(String, Node)>,
    plotter: Option<Plotter>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, child: impl Into<Node>) -> Self {
        self.set(name, child);
        self
    }

    /// Insert or replace a child, returning the replaced one.
    ///
    /// If the container was bound with [`plot_on`](Self::plot_on), the new
    /// child is bound too. Otherwise a replacement takes over the binding of
    /// the child it replaces. The replaced child is unbound.
    pub fn set(&mut self, name: impl Into<String>, child: impl Into<Node>) -> Option<Node> {
        let name = name.into();
        let mut child = child.into();
        if let Some(plotter) = &self.plotter {
            child.plot_on(plotter);
        }

        match self.children.iter().position(|(n, _)| *n == name) {
            Some(position) => {
                let slot = &mut self.children[position].1;
                if self.plotter.is_none() {
                    child.adopt_binding(slot);
                }
                let mut old = std::mem::replace(slot, child);
                old.unplot();
                Some(old)
            }
            None => {
                self.children.push((name, child));
                None
            }
        }
    }

    /// Remove a child and unbind it from its plotter.
    pub fn delete(&mut self, name: &str) -> Result<Node> {
        let position = self
            .children
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| MetricError::UnknownChild { name: name.to_string() })?;
        let (_, mut node) = self.children.remove(position);
        node.unplot();
        Ok(node)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.children.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Result<&Node> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
            .ok_or_else(|| MetricError::UnknownChild { name: name.to_string() })
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Node> {
        self.children
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
            .ok_or_else(|| MetricError::UnknownChild { name: name.to_string() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct children in insertion order
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().map(|(_, node)| node)
    }

    pub fn named_children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(n, node)| (n.as_str(), node))
    }

    /// Every leaf metric of the subtree, depth first.
    pub fn metrics(&self) -> Vec<&LeafMetric> {
        self.named_metrics().into_iter().map(|(_, m)| m).collect()
    }

    /// Every leaf metric of the subtree with its dotted path.
    ///
    /// Nested containers and wrappers each add one path segment.
    pub fn named_metrics(&self) -> Vec<(String, &LeafMetric)> {
        let mut out = Vec::new();
        self.collect_leaves(None, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: Option<&str>, out: &mut Vec<(String, &'a LeafMetric)>) {
        for (name, node) in &self.children {
            let path = join_path(prefix, name);
            match node {
                Node::Metric(metric) => metric.visit_leaves(&path, &mut |p, leaf| out.push((p, leaf))),
                Node::Container(container) => container.collect_leaves(Some(&path), out),
                Node::Config(_) => {}
            }
        }
    }

    /// Call `f` with every leaf metric of the subtree and its path.
    pub fn visit_leaves_mut(
        &mut self,
        f: &mut dyn FnMut(&str, &mut LeafMetric) -> Result<()>,
    ) -> Result<()> {
        self.visit_leaves_mut_under(None, f)
    }

    fn visit_leaves_mut_under(
        &mut self,
        prefix: Option<&str>,
        f: &mut dyn FnMut(&str, &mut LeafMetric) -> Result<()>,
    ) -> Result<()> {
        for (name, node) in &mut self.children {
            let path = join_path(prefix, name);
            match node {
                Node::Metric(metric) => metric.visit_leaves_mut(&path, f)?,
                Node::Container(container) => container.visit_leaves_mut_under(Some(&path), f)?,
                Node::Config(_) => {}
            }
        }
        Ok(())
    }

    /// Add a metric under its identity key.
    ///
    /// Fails if a metric with the same `(name, tag)` is already registered
    /// or the key is taken by another child.
    pub fn register(&mut self, metric: impl Into<Metric>) -> Result<()> {
        let metric = metric.into();
        let key = metric.name_id();
        let taken = self.children.iter().any(|(n, node)| {
            *n == key
                || node
                    .as_metric()
                    .is_some_and(|m| m.name() == metric.name() && m.tag() == metric.tag())
        });
        if taken {
            return Err(MetricError::DuplicateRegistration {
                name: metric.name().to_string(),
                tag: metric.tag().to_string(),
            });
        }
        tracing::trace!(key = %key, "registered metric");
        self.set(key, metric);
        Ok(())
    }

    /// Direct child metric with the given identity.
    pub fn metric(&self, name: &str, tag: &str) -> Result<&Metric> {
        self.children
            .iter()
            .filter_map(|(_, node)| node.as_metric())
            .find(|m| m.name() == name && m.tag() == tag)
            .ok_or_else(|| MetricError::UnknownMetric { name: name.to_string(), tag: tag.to_string() })
    }

    pub fn metric_mut(&mut self, name: &str, tag: &str) -> Result<&mut Metric> {
        self.children
            .iter_mut()
            .filter_map(|(_, node)| node.as_metric_mut())
            .find(|m| m.name() == name && m.tag() == tag)
            .ok_or_else(|| MetricError::UnknownMetric { name: name.to_string(), tag: tag.to_string() })
    }

    /// Call `f` with every leaf metric of the subtree.
    pub fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut LeafMetric)) {
        for (_, node) in &mut self.children {
            match node {
                Node::Metric(metric) => metric.for_each_leaf_mut(f),
                Node::Container(container) => container.for_each_leaf_mut(f),
                Node::Config(_) => {}
            }
        }
    }

    /// Reset every leaf metric of the subtree.
    pub fn reset(&mut self) {
        self.for_each_leaf_mut(&mut |leaf| leaf.reset());
    }

    /// Log every leaf metric of the subtree.
    ///
    /// Every leaf is checked first: if one cannot be logged (an empty
    /// accumulator, an index going backwards) the error is returned and no
    /// history is written.
    pub fn log(&mut self, index: Option<f64>) -> Result<()> {
        self.check_log(index, None)?;
        self.visit_leaves_mut(&mut |_, leaf| leaf.log(index).map(|_| ()))
    }

    /// Log the leaf metrics carrying `tag`, checking them all first.
    pub fn log_with_tag(&mut self, tag: &str, index: Option<f64>) -> Result<()> {
        self.check_log(index, Some(tag))?;
        self.visit_leaves_mut(&mut |_, leaf| {
            if leaf.tag() == tag {
                leaf.log(index)?;
            }
            Ok(())
        })
    }

    fn check_log(&self, index: Option<f64>, tag: Option<&str>) -> Result<()> {
        self.named_metrics()
            .into_iter()
            .filter(|(_, leaf)| tag.map_or(true, |tag| leaf.tag() == tag))
            .try_for_each(|(_, leaf)| leaf.check_log(index))
    }

    /// Bind every titled metric and config of the subtree to `plotter`.
    ///
    /// Children added later with [`set`](Self::set) are bound as well.
    pub fn plot_on(&mut self, plotter: &Plotter) {
        for (_, node) in &mut self.children {
            node.plot_on(plotter);
        }
        self.plotter = Some(plotter.clone());
    }

    /// Unbind the whole subtree.
    pub fn unplot(&mut self) {
        for (_, node) in &mut self.children {
            node.unplot();
        }
        self.plotter = None;
    }

    /// Serialize the subtree.
    pub fn state_dict(&self) -> Result<NodeState> {
        let mut children = Map::new();
        for (name, node) in &self.children {
            children.insert(name.clone(), serde_json::to_value(node.state_dict()?)?);
        }
        NodeState::new(CONTAINER_KIND).with_fields(&ContainerFields { children })
    }

    /// Load children from a state, rebuilding each through the default
    /// [`StateRegistry`].
    pub fn load_state_dict(&mut self, state: &NodeState) -> Result<()> {
        self.load_state_dict_with(state, &StateRegistry::default())
    }

    /// Load children from a state using the given registry.
    ///
    /// Children are built before any is inserted, so an unknown tag leaves
    /// the container unchanged.
    pub fn load_state_dict_with(&mut self, state: &NodeState, registry: &StateRegistry) -> Result<()> {
        state.expect_kind(CONTAINER_KIND)?;
        let fields: ContainerFields = state.fields_as()?;

        let mut built = Vec::with_capacity(fields.children.len());
        for (name, child) in fields.children {
            let child_state: NodeState = serde_json::from_value(child)?;
            built.push((name, registry.build(&child_state)?));
        }
        for (name, node) in built {
            self.set(name, node);
        }
        Ok(())
    }

    /// Rebuild a container from a state.
    pub fn from_state(state: &NodeState) -> Result<Self> {
        let mut container = Self::new();
        container.load_state_dict(state)?;
        Ok(container)
    }
}

#[derive(Serialize, Deserialize)]
struct ContainerFields {
    children: Map<String, Value>,
}

fn join_path(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{name}"),
        None => name.to_string(),
    }
}
