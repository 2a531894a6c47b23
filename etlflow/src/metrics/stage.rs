//! Metrics scoped to a single stage.

use super::MetricsCollector;
use std::fmt;
use std::sync::Arc;

/// Counter of records received by a stage.
pub const RECORDS_IN: &str = "records.in";

/// Counter of records emitted by a stage.
pub const RECORDS_OUT: &str = "records.out";

/// A metrics emitter bound to one stage name.
#[derive(Clone)]
pub struct StageMetrics {
    stage: String,
    collector: Arc<dyn MetricsCollector>,
}

impl StageMetrics {
    /// Creates metrics scoped to `stage`.
    #[must_use]
    pub fn new(stage: impl Into<String>, collector: Arc<dyn MetricsCollector>) -> Self {
        Self {
            stage: stage.into(),
            collector,
        }
    }

    /// Returns the stage this emitter is scoped to.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Increments a stage counter.
    pub fn count(&self, name: &str, delta: u64) {
        if delta > 0 {
            self.collector.count(&self.stage, name, delta);
        }
    }

    /// Sets a stage gauge.
    pub fn gauge(&self, name: &str, value: i64) {
        self.collector.gauge(&self.stage, name, value);
    }

    /// Increments `records.in`.
    pub fn records_in(&self, delta: u64) {
        self.count(RECORDS_IN, delta);
    }

    /// Increments `records.out`.
    pub fn records_out(&self, delta: u64) {
        self.count(RECORDS_OUT, delta);
    }
}

impl fmt::Debug for StageMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageMetrics")
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}
