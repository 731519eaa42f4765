//! Per-title series window with buffer-until-acknowledged delivery

use std::collections::BTreeMap;

use super::sink::{Sink, SinkError, WindowHandle, WindowKind, WindowOptions};

/// Points not yet acknowledged by the sink for one legend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XyBuffer {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl XyBuffer {
    pub fn push(&mut self, x: f64, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
    }

    /// Buffered points in ascending index order (stable for equal indexes).
    pub fn sorted(&self) -> (Vec<f64>, Vec<f64>) {
        let mut points: Vec<(f64, f64)> =
            self.x.iter().copied().zip(self.y.iter().copied()).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.into_iter().unzip()
    }

    /// Buffered points in push order
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.x.iter().copied().zip(self.y.iter().copied()).collect()
    }
}

/// Result of one window flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Points acknowledged by the sink
    pub delivered: usize,
    /// Points still buffered afterwards
    pub pending: usize,
    /// Sink calls that failed
    pub failures: usize,
}

impl FlushReport {
    pub(crate) fn merge(&mut self, other: FlushReport) {
        self.delivered += other.delivered;
        self.pending += other.pending;
        self.failures += other.failures;
    }
}

/// One series window: a lazily created sink handle and a buffer per legend.
#[derive(Debug, Clone, Default)]
pub struct SeriesWindow {
    handle: Option<WindowHandle>,
    buffers: BTreeMap<Option<String>, XyBuffer>,
}

impl SeriesWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<&WindowHandle> {
        self.handle.as_ref()
    }

    pub fn push(&mut self, legend: Option<&str>, x: f64, y: f64) {
        self.buffers.entry(legend.map(String::from)).or_default().push(x, y);
    }

    /// Total buffered points over all legends
    pub fn pending(&self) -> usize {
        self.buffers.values().map(XyBuffer::len).sum()
    }

    /// Buffered points of one legend, in push order
    pub fn pending_points(&self, legend: Option<&str>) -> Vec<(f64, f64)> {
        self.buffers
            .get(&legend.map(String::from))
            .map(XyBuffer::points)
            .unwrap_or_default()
    }

    /// Deliver every non-empty legend buffer.
    ///
    /// The handle is created on first use; if creation fails nothing is sent
    /// and creation is retried on the next flush. A legend buffer is cleared
    /// only after the sink acknowledged its append.
    pub fn flush(
        &mut self,
        sink: &mut dyn Sink,
        title: &str,
        options: &WindowOptions,
        errors: &mut Vec<SinkError>,
    ) -> FlushReport {
        let mut report = FlushReport::default();

        if self.handle.is_none() {
            match sink.create_window(title, WindowKind::Series, options) {
                Ok(handle) => {
                    tracing::debug!(title, handle = %handle, "created series window");
                    self.handle = Some(handle);
                }
                Err(e) => {
                    report.failures += 1;
                    errors.push(e);
                }
            }
        }

        let Some(handle) = self.handle.as_ref() else {
            report.pending = self.pending();
            return report;
        };

        for (legend, buffer) in &mut self.buffers {
            if buffer.is_empty() {
                continue;
            }
            let (x, y) = buffer.sorted();
            match sink.append_series(handle, legend.as_deref(), &x, &y) {
                Ok(()) => {
                    report.delivered += x.len();
                    buffer.clear();
                }
                Err(e) => {
                    report.failures += 1;
                    errors.push(e);
                }
            }
        }

        report.pending = self.pending();
        report
    }
}
