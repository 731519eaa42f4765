//! Metric bookkeeping for iterative experiments
//!
//! `mlogger` tracks scalar metrics produced by a training loop: it
//! accumulates values, indexes them by step or by elapsed time, groups them
//! in containers that can be reset, logged and saved as a tree, and forwards
//! logged points to a visualization sink through a buffering plot cache that
//! never drops a point when the sink fails.
//!
//! # Modules
//!
//! - [`metric`] - leaf metrics (Simple, Timer, Average, Sum, Maximum,
//!   Minimum, Dynamic) and parent wrappers
//! - [`history`] - append-only `(index, value)` logs
//! - [`container`] - hierarchical namespaces of metrics and configs
//! - [`config`] - key/value run configuration
//! - [`plot`] - sink boundary and the buffer-until-acknowledged plot cache
//! - [`state`] - tagged node state and the variant registry
//! - [`persist`] - JSON save/load and YAML plotter configuration
//!
//! # Example
//!
//! ```
//! use mlogger::container::Container;
//! use mlogger::metric::MetricBuilder;
//! use mlogger::plot::{MemorySink, Plotter, PlotterConfig};
//!
//! # fn main() -> mlogger::Result<()> {
//! let sink = MemorySink::new();
//! let plotter = Plotter::new(sink.clone(), PlotterConfig::manual());
//!
//! let mut xp = Container::new()
//!     .with("loss", MetricBuilder::new("loss").tag("train").plot_on(&plotter, "Loss").average());
//!
//! for epoch in 0..3 {
//!     xp.reset();
//!     for batch_loss in [1.0, 0.5] {
//!         if let Some(loss) = xp.get_mut("loss")?.as_metric_mut().and_then(|m| m.as_leaf_mut()) {
//!             loss.update_weighted(batch_loss / f64::from(epoch + 1), 32.0)?;
//!         }
//!     }
//!     xp.log(None)?;
//! }
//!
//! plotter.flush_all();
//! assert_eq!(sink.delivered_points("Loss", Some("train")).len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod coerce;
pub mod config;
pub mod container;
pub mod error;
pub mod history;
pub mod metric;
pub mod persist;
pub mod plot;
pub mod state;

pub use coerce::ToScalar;
pub use config::Config;
pub use container::{Container, Node};
pub use error::{MetricError, Result};
pub use history::{History, IndexingMode};
pub use metric::{LeafMetric, Metric, MetricBuilder, MetricKind, ParentWrapper};
pub use plot::{MemorySink, Plotter, PlotterConfig, Sink};
pub use state::{NodeState, StateRegistry};
