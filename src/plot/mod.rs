//! Deferred delivery of metric series and text panels to a visualization sink
//!
//! Metrics push points into a shared [`Plotter`]; the plotter buffers them per
//! window title and legend and hands them to a [`Sink`] when flushed. Nothing
//! is dropped on a sink failure: undelivered points stay buffered until a
//! later flush succeeds, and a failed window creation is retried.
//!
//! # Example
//!
//! ```
//! use mlogger::plot::{MemorySink, Plotter, PlotterConfig};
//!
//! let sink = MemorySink::new();
//! let plotter = Plotter::new(sink.clone(), PlotterConfig::manual());
//!
//! plotter.push("loss", Some("train"), 0.0, 1.5);
//! plotter.push("loss", Some("train"), 1.0, 1.2);
//! assert_eq!(plotter.pending("loss"), 2);
//!
//! plotter.flush_all();
//! assert_eq!(sink.delivered_points("loss", Some("train")), vec![(0.0, 1.5), (1.0, 1.2)]);
//! ```

mod cache;
mod config;
mod memory;
mod series;
mod sink;
mod text;


pub use cache::{PlotCache, PlotCacheState};
pub use config::{FlushMode, PlotterConfig};
pub use memory::{CreatedWindow, MemorySink, SeriesAppend, TextWrite};
pub use series::{FlushReport, SeriesWindow, XyBuffer};
pub use sink::{Sink, SinkError, WindowHandle, WindowKind, WindowOptions};
pub use text::TextWindow;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

/// Shared handle to one [`PlotCache`].
///
/// Clones refer to the same cache, so every metric bound to a plotter feeds
/// the same windows. The handle is single-threaded.
#[derive(Clone)]
pub struct Plotter {
    cache: Rc<RefCell<PlotCache>>,
}

impl std::fmt::Debug for Plotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Plotter").field(&self.cache.borrow()).finish()
    }
}

impl Plotter {
    pub fn new(sink: impl Sink + 'static, config: PlotterConfig) -> Self {
        Self { cache: Rc::new(RefCell::new(PlotCache::new(sink, config))) }
    }

    pub fn push(&self, title: &str, legend: Option<&str>, x: f64, y: f64) -> FlushReport {
        self.cache.borrow_mut().push(title, legend, x, y)
    }

    pub fn push_points(
        &self,
        title: &str,
        legend: Option<&str>,
        points: &[(f64, f64)],
    ) -> FlushReport {
        self.cache.borrow_mut().push_points(title, legend, points)
    }

    pub fn push_text(&self, title: &str, entries: &Map<String, Value>) -> FlushReport {
        self.cache.borrow_mut().push_text(title, entries)
    }

    pub fn flush(&self, title: &str) -> FlushReport {
        self.cache.borrow_mut().flush(title)
    }

    pub fn flush_text(&self, title: &str) -> FlushReport {
        self.cache.borrow_mut().flush_text(title)
    }

    pub fn flush_all(&self) -> FlushReport {
        self.cache.borrow_mut().flush_all()
    }

    #[must_use]
    pub fn pending(&self, title: &str) -> usize {
        self.cache.borrow().pending(title)
    }

    #[must_use]
    pub fn pending_points(&self, title: &str, legend: Option<&str>) -> Vec<(f64, f64)> {
        self.cache.borrow().pending_points(title, legend)
    }

    #[must_use]
    pub fn pending_text(&self, title: &str) -> usize {
        self.cache.borrow().pending_text(title)
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.cache.borrow().is_degraded()
    }

    #[must_use]
    pub fn mode(&self) -> FlushMode {
        self.cache.borrow().mode()
    }

    #[must_use]
    pub fn has_window(&self, title: &str) -> bool {
        self.cache.borrow().has_window(title)
    }

    pub fn set_window_options(&self, title: impl Into<String>, options: WindowOptions) {
        self.cache.borrow_mut().set_window_options(title, options);
    }

    #[must_use]
    pub fn window_options(&self, title: &str) -> Option<WindowOptions> {
        self.cache.borrow().window_options(title).cloned()
    }

    pub fn set_default_xlabel(&self, title: &str, xlabel: &str) {
        self.cache.borrow_mut().set_default_xlabel(title, xlabel);
    }

    #[must_use]
    pub fn state(&self) -> PlotCacheState {
        self.cache.borrow().state()
    }

    pub fn load_state(&self, state: &PlotCacheState) {
        self.cache.borrow_mut().load_state(state);
    }

    /// Whether both handles share one cache
    #[must_use]
    pub fn ptr_eq(&self, other: &Plotter) -> bool {
        Rc::ptr_eq(&self.cache, &other.cache)
    }
}
