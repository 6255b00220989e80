//! Accumulating error channel scoped to a single parse
//!
//! Validation errors do not abort a parse: they are appended here so the
//! whole document is checked in one pass and every violation surfaces in a
//! single report. The collector is explicit per-parse state (a cloneable
//! handle held by the parse context), never process-global.

use crate::error::ToscaError;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// One collected error together with the context it was raised in
#[derive(Debug)]
pub struct CollectedError {
    /// The error itself
    pub error: ToscaError,
    /// Context suffix, e.g. ` in node template "db"`
    pub near: String,
}

impl CollectedError {
    /// Render the error as one report line
    #[must_use]
    pub fn format(&self) -> String {
        format!("{}{}", self.error, self.near)
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    errors: Vec<CollectedError>,
    collecting: bool,
    paused: usize,
    near: String,
}

/// Cheaply cloneable handle to the per-parse error channel
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    state: Arc<RwLock<CollectorState>>,
}

impl ErrorCollector {
    /// Create a collector; it does not record anything until [`Self::start`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin collecting, discarding anything recorded previously
    pub fn start(&self) {
        let mut state = self.state.write();
        state.errors.clear();
        state.collecting = true;
        state.paused = 0;
        state.near.clear();
    }

    /// Stop collecting
    pub fn stop(&self) {
        self.state.write().collecting = false;
    }

    /// Suspend collection for speculative validation
    ///
    /// Errors appended while paused are dropped. Pauses nest; every
    /// `pause` must be matched by a [`Self::resume`].
    pub fn pause(&self) {
        self.state.write().paused += 1;
    }

    /// Resume collection after a [`Self::pause`]
    pub fn resume(&self) {
        let mut state = self.state.write();
        state.paused = state.paused.saturating_sub(1);
    }

    /// Set the context suffix appended to subsequently collected errors
    pub fn set_near(&self, near: impl Into<String>) {
        self.state.write().near = near.into();
    }

    /// Record an error
    pub fn append(&self, error: ToscaError) {
        let mut state = self.state.write();
        if !state.collecting || state.paused > 0 {
            return;
        }
        warn!(near = %state.near, "validation error: {error}");
        let near = state.near.clone();
        state.errors.push(CollectedError { error, near });
    }

    /// True if any error has been collected
    #[must_use]
    pub fn caught(&self) -> bool {
        !self.state.read().errors.is_empty()
    }

    /// Number of collected errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().errors.len()
    }

    /// True if no error has been collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().errors.is_empty()
    }

    /// One formatted line per collected error, in collection order
    #[must_use]
    pub fn report(&self) -> Vec<String> {
        self.state.read().errors.iter().map(CollectedError::format).collect()
    }

    /// Build the aggregate error raised at the end of a failed parse
    #[must_use]
    pub fn into_aggregate(&self, location: &str) -> ToscaError {
        let report = self.report();
        ToscaError::Aggregate {
            location: location.to_string(),
            count: report.len(),
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let collector = ErrorCollector::new();
        collector.start();
        collector.append(ToscaError::validation("first"));
        collector.append(ToscaError::validation("second"));
        collector.stop();
        assert_eq!(collector.report(), vec!["first", "second"]);
    }

    #[test]
    fn test_ignores_when_not_started() {
        let collector = ErrorCollector::new();
        collector.append(ToscaError::validation("dropped"));
        assert!(!collector.caught());
    }

    #[test]
    fn test_pause_drops_speculative_errors() {
        let collector = ErrorCollector::new();
        collector.start();
        collector.append(ToscaError::validation("kept"));
        collector.pause();
        collector.append(ToscaError::validation("dropped"));
        collector.resume();
        collector.append(ToscaError::validation("also kept"));
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.report(), vec!["kept", "also kept"]);
    }

    #[test]
    fn test_near_context_is_attached() {
        let collector = ErrorCollector::new();
        collector.start();
        collector.set_near(" in node template \"db\"");
        collector.append(ToscaError::validation("bad value"));
        collector.set_near("");
        let report = collector.report();
        assert_eq!(report[0], "bad value in node template \"db\"");
    }

    #[test]
    fn test_start_resets() {
        let collector = ErrorCollector::new();
        collector.start();
        collector.append(ToscaError::validation("stale"));
        collector.start();
        assert!(collector.is_empty());
    }
}
