//! In-memory sink implementation

use std::cell::RefCell;
use std::rc::Rc;

use super::sink::{Sink, SinkError, WindowHandle, WindowKind, WindowOptions};

/// A window created on a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub kind: WindowKind,
    pub options: WindowOptions,
}

/// One successful `append_series` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAppend {
    pub handle: WindowHandle,
    pub legend: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// One successful `write_text` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TextWrite {
    pub handle: WindowHandle,
    pub text: String,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    windows: Vec<CreatedWindow>,
    appends: Vec<SeriesAppend>,
    writes: Vec<TextWrite>,
    fail_create: usize,
    fail_append: usize,
    fail_text: usize,
    offline: bool,
    attempts: usize,
}

/// Sink that records every delivery in memory.
///
/// Clones share the same recording, so a test can hand one clone to a
/// [`Plotter`](super::Plotter) and inspect or inject failures through
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Rc<RefCell<MemorySinkState>>,
}

impl MemorySink {
    /// Create an empty, healthy sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` window creations
    pub fn fail_next_creates(&self, n: usize) {
        self.state.borrow_mut().fail_create = n;
    }

    /// Fail the next `n` series appends
    pub fn fail_next_appends(&self, n: usize) {
        self.state.borrow_mut().fail_append = n;
    }

    /// Fail the next `n` text writes
    pub fn fail_next_texts(&self, n: usize) {
        self.state.borrow_mut().fail_text = n;
    }

    /// Fail every call until set back online
    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    /// Windows created so far
    pub fn windows(&self) -> Vec<CreatedWindow> {
        self.state.borrow().windows.clone()
    }

    /// Successful series appends so far
    pub fn appends(&self) -> Vec<SeriesAppend> {
        self.state.borrow().appends.clone()
    }

    /// Successful text writes so far
    pub fn writes(&self) -> Vec<TextWrite> {
        self.state.borrow().writes.clone()
    }

    /// Total calls received, failed or not
    pub fn attempts(&self) -> usize {
        self.state.borrow().attempts
    }

    /// All points delivered for a window title and legend, in delivery order.
    pub fn delivered_points(&self, title: &str, legend: Option<&str>) -> Vec<(f64, f64)> {
        let state = self.state.borrow();
        let handles: Vec<&WindowHandle> =
            state.windows.iter().filter(|w| w.title == title).map(|w| &w.handle).collect();
        state
            .appends
            .iter()
            .filter(|a| handles.contains(&&a.handle) && a.legend.as_deref() == legend)
            .flat_map(|a| a.x.iter().copied().zip(a.y.iter().copied()))
            .collect()
    }

    /// Last text written to the window with the given title.
    pub fn last_text(&self, title: &str) -> Option<String> {
        let state = self.state.borrow();
        let handle = state.windows.iter().find(|w| w.title == title).map(|w| &w.handle)?;
        state.writes.iter().rev().find(|w| &w.handle == handle).map(|w| w.text.clone())
    }

    fn knows(state: &MemorySinkState, handle: &WindowHandle) -> bool {
        state.windows.iter().any(|w| &w.handle == handle)
    }
}

/// Consume one pending injected failure.
fn take_failure(counter: &mut usize, offline: bool) -> bool {
    if offline {
        return true;
    }
    if *counter > 0 {
        *counter -= 1;
        return true;
    }
    false
}

impl Sink for MemorySink {
    fn create_window(
        &mut self,
        title: &str,
        kind: WindowKind,
        options: &WindowOptions,
    ) -> Result<WindowHandle, SinkError> {
        let mut state = self.state.borrow_mut();
        state.attempts += 1;
        let offline = state.offline;
        if take_failure(&mut state.fail_create, offline) {
            return Err(SinkError::Unavailable(format!("cannot create window '{title}'")));
        }
        let handle = WindowHandle(format!("win-{}", state.windows.len() + 1));
        state.windows.push(CreatedWindow {
            handle: handle.clone(),
            title: title.to_string(),
            kind,
            options: options.clone(),
        });
        Ok(handle)
    }

    fn append_series(
        &mut self,
        handle: &WindowHandle,
        legend: Option<&str>,
        x: &[f64],
        y: &[f64],
    ) -> Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        state.attempts += 1;
        let offline = state.offline;
        if take_failure(&mut state.fail_append, offline) {
            return Err(SinkError::Unavailable("append failed".to_string()));
        }
        if !Self::knows(&state, handle) {
            return Err(SinkError::UnknownWindow(handle.clone()));
        }
        if x.len() != y.len() {
            return Err(SinkError::Rejected(format!("{} x values for {} y values", x.len(), y.len())));
        }
        state.appends.push(SeriesAppend {
            handle: handle.clone(),
            legend: legend.map(String::from),
            x: x.to_vec(),
            y: y.to_vec(),
        });
        Ok(())
    }

    fn write_text(&mut self, handle: &WindowHandle, text: &str) -> Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        state.attempts += 1;
        let offline = state.offline;
        if take_failure(&mut state.fail_text, offline) {
            return Err(SinkError::Unavailable("text write failed".to_string()));
        }
        if !Self::knows(&state, handle) {
            return Err(SinkError::UnknownWindow(handle.clone()));
        }
        state.writes.push(TextWrite { handle: handle.clone(), text: text.to_string() });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MemorySink"
    }
}
