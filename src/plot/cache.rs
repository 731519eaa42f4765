//! Plot cache: buffered delivery of series and text panels to a sink

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::{FlushMode, PlotterConfig};
use super::series::{FlushReport, SeriesWindow};
use super::sink::{Sink, SinkError, WindowOptions};
use super::text::TextWindow;

/// Serializable part of a plot cache: per-title window options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotCacheState {
    pub windows: BTreeMap<String, WindowOptions>,
}

/// Buffers series points and text entries per title and delivers them to a
/// [`Sink`].
///
/// Data is kept until the sink acknowledges it. A failed flush leaves the
/// buffers untouched and the next flush retries the same points. In
/// [`FlushMode::Automatic`] every push triggers a flush of its title; in
/// [`FlushMode::Manual`] data waits for [`flush`](Self::flush) or
/// [`flush_all`](Self::flush_all).
///
/// With `live` enabled, the first sink failure logs a single warning and
/// turns every later push and flush into a no-op; points buffered before the
/// failure stay buffered.
pub struct PlotCache {
    sink: Box<dyn Sink>,
    config: PlotterConfig,
    series: BTreeMap<String, SeriesWindow>,
    texts: BTreeMap<String, TextWindow>,
    degraded: bool,
}

impl std::fmt::Debug for PlotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotCache")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .field("series", &self.series)
            .field("texts", &self.texts)
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl PlotCache {
    /// Create a cache delivering to `sink`.
    pub fn new(sink: impl Sink + 'static, config: PlotterConfig) -> Self {
        Self {
            sink: Box::new(sink),
            config,
            series: BTreeMap::new(),
            texts: BTreeMap::new(),
            degraded: false,
        }
    }

    pub fn config(&self) -> &PlotterConfig {
        &self.config
    }

    pub fn mode(&self) -> FlushMode {
        self.config.mode
    }

    /// Whether a live-mode failure turned plotting off
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Buffer one point; flushes the title in automatic mode.
    pub fn push(&mut self, title: &str, legend: Option<&str>, x: f64, y: f64) -> FlushReport {
        self.push_points(title, legend, &[(x, y)])
    }

    /// Buffer several points for one legend; flushes once in automatic mode.
    pub fn push_points(
        &mut self,
        title: &str,
        legend: Option<&str>,
        points: &[(f64, f64)],
    ) -> FlushReport {
        if self.degraded {
            return FlushReport::default();
        }
        let window = self.series.entry(title.to_string()).or_default();
        for &(x, y) in points {
            window.push(legend, x, y);
        }
        tracing::trace!(title, ?legend, count = points.len(), "buffered series points");

        match self.config.mode {
            FlushMode::Automatic => self.flush(title),
            FlushMode::Manual => FlushReport { pending: self.pending(title), ..Default::default() },
        }
    }

    /// Merge entries into a text panel; flushes the panel in automatic mode.
    pub fn push_text(&mut self, title: &str, entries: &Map<String, Value>) -> FlushReport {
        if self.degraded {
            return FlushReport::default();
        }
        self.texts.entry(title.to_string()).or_default().merge(entries);

        match self.config.mode {
            FlushMode::Automatic => self.flush_text(title),
            FlushMode::Manual => {
                FlushReport { pending: self.pending_text(title), ..Default::default() }
            }
        }
    }

    /// Deliver every buffered point of one series title.
    pub fn flush(&mut self, title: &str) -> FlushReport {
        if self.degraded {
            return FlushReport::default();
        }
        let Some(window) = self.series.get_mut(title) else {
            return FlushReport::default();
        };
        let default_options = WindowOptions::default();
        let options = self.config.windows.get(title).unwrap_or(&default_options);
        let mut errors = Vec::new();
        let report = window.flush(self.sink.as_mut(), title, options, &mut errors);
        self.absorb(title, report, errors)
    }

    /// Deliver the pending entries of one text panel.
    pub fn flush_text(&mut self, title: &str) -> FlushReport {
        if self.degraded {
            return FlushReport::default();
        }
        let Some(window) = self.texts.get_mut(title) else {
            return FlushReport::default();
        };
        let default_options = WindowOptions::default();
        let options = self.config.windows.get(title).unwrap_or(&default_options);
        let mut errors = Vec::new();
        let report = window.flush(self.sink.as_mut(), title, options, &mut errors);
        self.absorb(title, report, errors)
    }

    /// Flush every known series title and text panel.
    pub fn flush_all(&mut self) -> FlushReport {
        let mut total = FlushReport::default();
        let series_titles: Vec<String> = self.series.keys().cloned().collect();
        for title in &series_titles {
            total.merge(self.flush(title));
        }
        let text_titles: Vec<String> = self.texts.keys().cloned().collect();
        for title in &text_titles {
            total.merge(self.flush_text(title));
        }
        total
    }

    /// Buffered point count of a series title
    pub fn pending(&self, title: &str) -> usize {
        self.series.get(title).map_or(0, SeriesWindow::pending)
    }

    /// Buffered points of one legend, in push order
    pub fn pending_points(&self, title: &str, legend: Option<&str>) -> Vec<(f64, f64)> {
        self.series.get(title).map(|w| w.pending_points(legend)).unwrap_or_default()
    }

    /// Buffered key count of a text panel
    pub fn pending_text(&self, title: &str) -> usize {
        self.texts.get(title).map_or(0, TextWindow::pending)
    }

    /// Known series titles
    pub fn series_titles(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Known text panel titles
    pub fn text_titles(&self) -> impl Iterator<Item = &str> {
        self.texts.keys().map(String::as_str)
    }

    /// Whether the sink window for a series title exists
    pub fn has_window(&self, title: &str) -> bool {
        self.series.get(title).is_some_and(|w| w.handle().is_some())
            || self.texts.get(title).is_some_and(|w| w.handle().is_some())
    }

    /// Set the options used when the window for `title` is created.
    pub fn set_window_options(&mut self, title: impl Into<String>, options: WindowOptions) {
        self.config.windows.insert(title.into(), options);
    }

    pub fn window_options(&self, title: &str) -> Option<&WindowOptions> {
        self.config.windows.get(title)
    }

    /// Set the x label for `title` unless it is already configured.
    pub fn set_default_xlabel(&mut self, title: &str, xlabel: &str) {
        let options = self.config.windows.entry(title.to_string()).or_default();
        if options.xlabel.is_none() {
            options.xlabel = Some(xlabel.to_string());
        }
    }

    pub fn state(&self) -> PlotCacheState {
        PlotCacheState { windows: self.config.windows.clone() }
    }

    pub fn load_state(&mut self, state: &PlotCacheState) {
        for (title, options) in &state.windows {
            self.config.windows.insert(title.clone(), options.clone());
        }
    }

    fn absorb(&mut self, title: &str, report: FlushReport, errors: Vec<SinkError>) -> FlushReport {
        if report.delivered > 0 {
            tracing::debug!(title, delivered = report.delivered, "delivered to sink");
        }
        for error in errors {
            if self.config.live {
                if !self.degraded {
                    tracing::warn!(
                        title,
                        %error,
                        "sink failed during live plotting; plotting disabled, metrics keep accumulating"
                    );
                    self.degraded = true;
                }
            } else {
                tracing::warn!(
                    title,
                    %error,
                    pending = report.pending,
                    "sink delivery failed; keeping buffered data for the next flush"
                );
            }
        }
        report
    }
}
