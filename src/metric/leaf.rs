//! Leaf metrics: a typed value, its history and an optional plot binding

use serde::{Deserialize, Serialize};

use super::{name_id, MetricKind, DEFAULT_TAG};
use crate::clock::now_secs;
use crate::coerce::ToScalar;
use crate::error::{MetricError, Result};
use crate::history::{History, HistoryState, IndexingMode};
use crate::plot::Plotter;
use crate::state::{float, NodeState};

/// Observer callback without payload.
pub type Hook = Box<dyn FnMut()>;

type DynamicFn = Box<dyn FnMut() -> Result<f64>>;

/// Variant-specific state of a leaf metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Last value given to `update`
    Simple { val: f64 },
    /// Reference timestamps in Unix seconds
    Timer { start: f64, current: f64 },
    /// Weighted mean: `offset + accumulated / weight_total`
    Average { accumulated: f64, weight_total: f64, offset: f64 },
    /// Weighted total: `offset + accumulated`
    Sum { accumulated: f64, weight_total: f64, offset: f64 },
    /// Largest value seen
    Maximum { val: f64 },
    /// Smallest value seen
    Minimum { val: f64 },
    /// Last result of the bound function
    Dynamic { last: Option<f64> },
}

impl MetricValue {
    /// Zero state of a kind. Timers start at the current time.
    pub fn zero(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Simple => MetricValue::Simple { val: 0.0 },
            MetricKind::Timer => {
                let now = now_secs();
                MetricValue::Timer { start: now, current: now }
            }
            MetricKind::Average => {
                MetricValue::Average { accumulated: 0.0, weight_total: 0.0, offset: 0.0 }
            }
            MetricKind::Sum => MetricValue::Sum { accumulated: 0.0, weight_total: 0.0, offset: 0.0 },
            MetricKind::Maximum => MetricValue::Maximum { val: f64::NEG_INFINITY },
            MetricKind::Minimum => MetricValue::Minimum { val: f64::INFINITY },
            MetricKind::Dynamic => MetricValue::Dynamic { last: None },
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Simple { .. } => MetricKind::Simple,
            MetricValue::Timer { .. } => MetricKind::Timer,
            MetricValue::Average { .. } => MetricKind::Average,
            MetricValue::Sum { .. } => MetricKind::Sum,
            MetricValue::Maximum { .. } => MetricKind::Maximum,
            MetricValue::Minimum { .. } => MetricKind::Minimum,
            MetricValue::Dynamic { .. } => MetricKind::Dynamic,
        }
    }
}

/// Weights must be finite and strictly positive.
pub(crate) fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(MetricError::InvalidWeight { weight })
    }
}

#[derive(Serialize, Deserialize)]
struct CommonFields {
    name: String,
    tag: String,
    history: HistoryState,
    #[serde(default)]
    plot_title: Option<String>,
    #[serde(default)]
    plot_legend: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ValFields {
    #[serde(with = "float")]
    val: f64,
}

#[derive(Serialize, Deserialize)]
struct TimerFields {
    #[serde(with = "float")]
    start: f64,
    #[serde(with = "float")]
    current: f64,
}

#[derive(Serialize, Deserialize)]
struct AccumulatorFields {
    #[serde(with = "float")]
    accumulated: f64,
    #[serde(with = "float")]
    weight_total: f64,
    #[serde(with = "float", default)]
    offset: f64,
}

#[derive(Serialize, Deserialize)]
struct DynamicFields {
    #[serde(with = "float::option", default)]
    val: Option<f64>,
}

/// A named metric holding one value of a fixed [`MetricKind`].
///
/// Identity is `(name, tag)`. `update` changes the value, `log` commits it to
/// the [`History`] and pushes the point to the bound [`Plotter`], if any.
/// `reset` restores the zero state of the kind and leaves the history alone.
pub struct LeafMetric {
    name: String,
    tag: String,
    value: MetricValue,
    history: History,
    plot_title: Option<String>,
    plot_legend: Option<String>,
    plotter: Option<Plotter>,
    function: Option<DynamicFn>,
    on_update: Vec<Hook>,
    on_log: Vec<Hook>,
    on_improved: Vec<Hook>,
}

impl std::fmt::Debug for LeafMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafMetric")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("value", &self.value)
            .field("history_len", &self.history.len())
            .field("plot_title", &self.plot_title)
            .field("plot_legend", &self.plot_legend)
            .field("bound", &self.plotter.is_some())
            .field("hooks", &(self.on_update.len() + self.on_log.len() + self.on_improved.len()))
            .finish()
    }
}

impl LeafMetric {
    /// Create a metric with the default tag.
    ///
    /// Timers always use [`IndexingMode::Step`].
    pub fn new(name: impl Into<String>, kind: MetricKind, indexing: IndexingMode) -> Self {
        let indexing = if kind == MetricKind::Timer { IndexingMode::Step } else { indexing };
        Self {
            name: name.into(),
            tag: DEFAULT_TAG.to_string(),
            value: MetricValue::zero(kind),
            history: History::new(indexing),
            plot_title: None,
            plot_legend: None,
            plotter: None,
            function: None,
            on_update: Vec::new(),
            on_log: Vec::new(),
            on_improved: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub(crate) fn set_tag(&mut self, tag: &str) {
        self.tag = tag.to_string();
    }

    #[must_use]
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Lowercase key derived from `(name, tag)`
    #[must_use]
    pub fn name_id(&self) -> String {
        name_id(&self.name, &self.tag)
    }

    /// Raw variant state
    #[must_use]
    pub fn internal_state(&self) -> MetricValue {
        self.value
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn indexing_mode(&self) -> IndexingMode {
        self.history.mode()
    }

    #[must_use]
    pub fn plot_title(&self) -> Option<&str> {
        self.plot_title.as_deref()
    }

    /// Legend used for plotted points: the explicit legend if one was set,
    /// otherwise the tag, or none for the default tag.
    #[must_use]
    pub fn legend(&self) -> Option<&str> {
        self.plot_legend
            .as_deref()
            .or_else(|| (self.tag != DEFAULT_TAG).then_some(self.tag.as_str()))
    }

    /// Legend set explicitly at binding time
    #[must_use]
    pub fn plot_legend(&self) -> Option<&str> {
        self.plot_legend.as_deref()
    }

    #[must_use]
    pub fn plotter(&self) -> Option<&Plotter> {
        self.plotter.as_ref()
    }

    /// Update with weight `1`.
    pub fn update<V: ToScalar>(&mut self, value: V) -> Result<()> {
        self.update_weighted(value, 1.0)
    }

    /// Update with an explicit weight.
    ///
    /// The weight only matters to Average and Sum, which reject weights that
    /// are not finite and strictly positive. Dynamic metrics are updated
    /// through [`tick`](Self::tick).
    pub fn update_weighted<V: ToScalar>(&mut self, value: V, weight: f64) -> Result<()> {
        if self.kind() == MetricKind::Dynamic {
            return Err(self.unsupported("update with a value"));
        }
        let v = value.to_scalar()?;
        let mut improved = false;
        match &mut self.value {
            MetricValue::Simple { val } => *val = v,
            MetricValue::Timer { current, .. } => *current = v,
            MetricValue::Average { accumulated, weight_total, .. }
            | MetricValue::Sum { accumulated, weight_total, .. } => {
                check_weight(weight)?;
                *accumulated += v * weight;
                *weight_total += weight;
            }
            MetricValue::Maximum { val } => {
                if v > *val {
                    *val = v;
                    improved = true;
                }
            }
            MetricValue::Minimum { val } => {
                if v < *val {
                    *val = v;
                    improved = true;
                }
            }
            MetricValue::Dynamic { .. } => {}
        }

        if improved {
            for hook in &mut self.on_improved {
                hook();
            }
        }
        self.fire_on_update();
        Ok(())
    }

    /// Argument-less update: a Timer reads the clock, a Dynamic metric
    /// evaluates its function.
    pub fn tick(&mut self) -> Result<()> {
        let kind = self.kind();
        match &mut self.value {
            MetricValue::Timer { current, .. } => *current = now_secs(),
            MetricValue::Dynamic { last } => {
                let function = self
                    .function
                    .as_mut()
                    .ok_or_else(|| MetricError::NoFunctionBound { name: self.name.clone() })?;
                *last = Some(function()?);
            }
            _ => return Err(MetricError::MissingValue { name: self.name.clone(), kind: kind.as_str() }),
        }
        self.fire_on_update();
        Ok(())
    }

    /// Restore the zero state of the kind. History, hooks and bindings stay.
    pub fn reset(&mut self) {
        self.value = MetricValue::zero(self.kind());
    }

    /// Current value.
    pub fn value(&self) -> Result<f64> {
        match self.value {
            MetricValue::Simple { val } | MetricValue::Maximum { val } | MetricValue::Minimum { val } => {
                Ok(val)
            }
            MetricValue::Timer { start, current } => Ok(current - start),
            MetricValue::Average { accumulated, weight_total, offset } => {
                if weight_total == 0.0 {
                    return Err(MetricError::EmptyAccumulator { name: self.name.clone() });
                }
                Ok(offset + accumulated / weight_total)
            }
            MetricValue::Sum { accumulated, weight_total, offset } => {
                if weight_total == 0.0 {
                    return Err(MetricError::EmptyAccumulator { name: self.name.clone() });
                }
                Ok(offset + accumulated)
            }
            MetricValue::Dynamic { last } => {
                last.ok_or_else(|| MetricError::Unevaluated { name: self.name.clone() })
            }
        }
    }

    /// Constant added to an Average or Sum value. Cleared by `reset`.
    pub fn set_offset(&mut self, constant: f64) -> Result<()> {
        if let MetricValue::Average { offset, .. } | MetricValue::Sum { offset, .. } = &mut self.value {
            *offset = constant;
            return Ok(());
        }
        Err(self.unsupported("a constant offset"))
    }

    /// Bind the function a Dynamic metric evaluates on `tick`.
    pub fn set_function<F, V>(&mut self, mut function: F) -> Result<()>
    where
        F: FnMut() -> V + 'static,
        V: ToScalar,
    {
        if self.kind() != MetricKind::Dynamic {
            return Err(self.unsupported("a bound function"));
        }
        self.function = Some(Box::new(move || function().to_scalar()));
        Ok(())
    }

    /// Run `hook` after every successful update.
    pub fn on_update(&mut self, hook: impl FnMut() + 'static) {
        self.on_update.push(Box::new(hook));
    }

    /// Run `hook` after every successful log.
    pub fn on_log(&mut self, hook: impl FnMut() + 'static) {
        self.on_log.push(Box::new(hook));
    }

    /// Run `hook` when a Maximum or Minimum strictly improves.
    pub fn on_improved(&mut self, hook: impl FnMut() + 'static) -> Result<()> {
        match self.kind() {
            MetricKind::Maximum | MetricKind::Minimum => {
                self.on_improved.push(Box::new(hook));
                Ok(())
            }
            _ => Err(self.unsupported("improvement hooks")),
        }
    }

    /// Drop every registered hook.
    pub fn clear_hooks(&mut self) {
        self.on_update.clear();
        self.on_log.clear();
        self.on_improved.clear();
    }

    /// Commit the current value to the history and the bound plotter.
    ///
    /// Returns the index used. Fails without side effects if the value is
    /// not readable or the index goes backwards.
    pub fn log(&mut self, index: Option<f64>) -> Result<f64> {
        self.check_log(index)?;
        let value = self.value()?;
        let index = self.history.log(index, value)?;

        if let (Some(plotter), Some(title)) = (&self.plotter, &self.plot_title) {
            plotter.push(title, self.legend(), index, value);
        }
        for hook in &mut self.on_log {
            hook();
        }
        Ok(index)
    }

    /// Fail the way [`log`](Self::log) would, without logging.
    pub fn check_log(&self, index: Option<f64>) -> Result<()> {
        self.value()?;
        match index {
            Some(index) => self.history.check_index(index),
            None => Ok(()),
        }
    }

    /// Most recently logged value
    #[must_use]
    pub fn last_logged(&self) -> Option<f64> {
        self.history.last_value()
    }

    /// Bind to a plotter and replay the existing history into it.
    ///
    /// Time-indexed metrics set the window's default x label.
    pub fn plot_on(&mut self, plotter: &Plotter, title: impl Into<String>, legend: Option<&str>) {
        let title = title.into();
        self.plot_legend = legend.map(String::from);

        if let Some(label) = self.history.mode().axis_label() {
            plotter.set_default_xlabel(&title, label);
        }
        if !self.history.is_empty() {
            let points: Vec<(f64, f64)> = self.history.points().collect();
            plotter.push_points(&title, self.legend(), &points);
        }

        self.plot_title = Some(title);
        self.plotter = Some(plotter.clone());
    }

    /// Rebind to `plotter` under the stored title, if there is one.
    ///
    /// Returns whether a binding was made. Already bound to the same
    /// plotter is a no-op.
    pub fn replot_on(&mut self, plotter: &Plotter) -> bool {
        if self.plotter.as_ref().is_some_and(|p| p.ptr_eq(plotter)) {
            return false;
        }
        match self.plot_title.clone() {
            Some(title) => {
                let legend = self.plot_legend.clone();
                self.plot_on(plotter, title, legend.as_deref());
                true
            }
            None => false,
        }
    }

    /// Remove the plotter binding. The title and legend are kept.
    pub fn unplot(&mut self) {
        self.plotter = None;
    }

    /// Serialize to a tagged state.
    pub fn state_dict(&self) -> Result<NodeState> {
        let common = CommonFields {
            name: self.name.clone(),
            tag: self.tag.clone(),
            history: self.history.state(),
            plot_title: self.plot_title.clone(),
            plot_legend: self.plot_legend.clone(),
        };
        let state = NodeState::new(self.kind().as_str()).with_fields(&common)?;

        match self.value {
            MetricValue::Simple { val } | MetricValue::Maximum { val } | MetricValue::Minimum { val } => {
                state.with_fields(&ValFields { val })
            }
            MetricValue::Timer { start, current } => state.with_fields(&TimerFields { start, current }),
            MetricValue::Average { accumulated, weight_total, offset }
            | MetricValue::Sum { accumulated, weight_total, offset } => {
                state.with_fields(&AccumulatorFields { accumulated, weight_total, offset })
            }
            MetricValue::Dynamic { last } => state.with_fields(&DynamicFields { val: last }),
        }
    }

    /// Load a state of the same kind into this metric.
    ///
    /// Hooks, the plotter binding and the Dynamic function are kept.
    pub fn load_state_dict(&mut self, state: &NodeState) -> Result<()> {
        state.expect_kind(self.kind().as_str())?;
        let common: CommonFields = state.fields_as()?;

        let value = match self.kind() {
            MetricKind::Simple => MetricValue::Simple { val: state.fields_as::<ValFields>()?.val },
            MetricKind::Maximum => MetricValue::Maximum { val: state.fields_as::<ValFields>()?.val },
            MetricKind::Minimum => MetricValue::Minimum { val: state.fields_as::<ValFields>()?.val },
            MetricKind::Timer => {
                let TimerFields { start, current } = state.fields_as()?;
                MetricValue::Timer { start, current }
            }
            MetricKind::Average => {
                let AccumulatorFields { accumulated, weight_total, offset } = state.fields_as()?;
                MetricValue::Average { accumulated, weight_total, offset }
            }
            MetricKind::Sum => {
                let AccumulatorFields { accumulated, weight_total, offset } = state.fields_as()?;
                MetricValue::Sum { accumulated, weight_total, offset }
            }
            MetricKind::Dynamic => MetricValue::Dynamic { last: state.fields_as::<DynamicFields>()?.val },
        };

        self.history.load_state(&common.history)?;
        self.name = common.name;
        self.tag = common.tag;
        self.plot_title = common.plot_title;
        self.plot_legend = common.plot_legend;
        self.value = value;
        Ok(())
    }

    /// Build a fresh metric from a tagged state.
    pub fn from_state(state: &NodeState) -> Result<Self> {
        let kind: MetricKind = state.kind.parse()?;
        let common: CommonFields = state.fields_as()?;
        let mut metric = Self::new(common.name, kind, common.history.indexing_mode);
        metric.load_state_dict(state)?;
        Ok(metric)
    }

    fn fire_on_update(&mut self) {
        for hook in &mut self.on_update {
            hook();
        }
    }

    fn unsupported(&self, operation: &'static str) -> MetricError {
        MetricError::Unsupported {
            name: self.name.clone(),
            kind: self.kind().as_str(),
            operation,
        }
    }
}
