//! Builder for leaf metrics

use super::{LeafMetric, MetricKind, DEFAULT_TAG};
use crate::coerce::ToScalar;
use crate::error::Result;
use crate::history::IndexingMode;
use crate::plot::Plotter;

/// Builder for [`LeafMetric`].
///
/// Indexing defaults to [`IndexingMode::Step`]; there is no process-wide
/// default.
///
/// # Example
///
/// ```
/// use mlogger::metric::MetricBuilder;
///
/// let mut loss = MetricBuilder::new("loss").tag("train").average();
/// loss.update(1.0).unwrap();
/// loss.update(3.0).unwrap();
/// assert_eq!(loss.value().unwrap(), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct MetricBuilder {
    name: String,
    tag: String,
    indexing: IndexingMode,
    plot: Option<(Plotter, String)>,
    legend: Option<String>,
}

impl MetricBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: DEFAULT_TAG.to_string(),
            indexing: IndexingMode::Step,
            plot: None,
            legend: None,
        }
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn indexing(mut self, mode: IndexingMode) -> Self {
        self.indexing = mode;
        self
    }

    /// Shorthand for `indexing(IndexingMode::Time)`
    #[must_use]
    pub fn time_indexed(self) -> Self {
        self.indexing(IndexingMode::Time)
    }

    /// Plot logged points in the window `title`.
    #[must_use]
    pub fn plot_on(mut self, plotter: &Plotter, title: impl Into<String>) -> Self {
        self.plot = Some((plotter.clone(), title.into()));
        self
    }

    /// Legend to plot under instead of the tag.
    #[must_use]
    pub fn legend(mut self, legend: impl Into<String>) -> Self {
        self.legend = Some(legend.into());
        self
    }

    /// Build a metric of the given kind.
    pub fn build(self, kind: MetricKind) -> LeafMetric {
        let mut metric = LeafMetric::new(self.name, kind, self.indexing);
        metric.set_tag(&self.tag);
        if let Some((plotter, title)) = self.plot {
            metric.plot_on(&plotter, title, self.legend.as_deref());
        }
        metric
    }

    pub fn simple(self) -> LeafMetric {
        self.build(MetricKind::Simple)
    }

    /// Timers are always step-indexed.
    pub fn timer(self) -> LeafMetric {
        self.build(MetricKind::Timer)
    }

    pub fn average(self) -> LeafMetric {
        self.build(MetricKind::Average)
    }

    pub fn sum(self) -> LeafMetric {
        self.build(MetricKind::Sum)
    }

    pub fn maximum(self) -> LeafMetric {
        self.build(MetricKind::Maximum)
    }

    pub fn minimum(self) -> LeafMetric {
        self.build(MetricKind::Minimum)
    }

    /// Dynamic metric evaluating `function` on every `tick`.
    pub fn dynamic<F, V>(self, function: F) -> Result<LeafMetric>
    where
        F: FnMut() -> V + 'static,
        V: ToScalar,
    {
        let mut metric = self.build(MetricKind::Dynamic);
        metric.set_function(function)?;
        Ok(metric)
    }
}
