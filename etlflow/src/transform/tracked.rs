//! Record counting around a transformation.

use super::Transformation;
use crate::errors::{StageOperation, TransformationError};
use crate::metrics::StageMetrics;
use crate::plugin::Emitter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a transformation is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Count records in and out.
    #[default]
    Both,
    /// Count only records in.
    InOnly,
    /// Count only records out.
    OutOnly,
}

impl TrackingMode {
    /// Returns true if records in are counted.
    #[must_use]
    pub const fn counts_in(self) -> bool {
        matches!(self, Self::Both | Self::InOnly)
    }

    /// Returns true if records out are counted.
    #[must_use]
    pub const fn counts_out(self) -> bool {
        matches!(self, Self::Both | Self::OutOnly)
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Both => write!(f, "both"),
            Self::InOnly => write!(f, "in_only"),
            Self::OutOnly => write!(f, "out_only"),
        }
    }
}

/// An emitter that counts what passes through it.
pub struct CountingEmitter<'a, T> {
    inner: &'a mut dyn Emitter<T>,
    count: u64,
}

impl<'a, T> CountingEmitter<'a, T> {
    /// Wraps `inner`.
    pub fn new(inner: &'a mut dyn Emitter<T>) -> Self {
        Self { inner, count: 0 }
    }

    /// Returns how many values were emitted.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }
}

impl<T> Emitter<T> for CountingEmitter<'_, T> {
    fn emit(&mut self, value: T) {
        self.count += 1;
        self.inner.emit(value);
    }
}

/// A transformation instrumented with record counters.
///
/// Counters are owned by the task running the transformation; every
/// increment is mirrored to the stage's metrics.
pub struct TrackedTransform<T> {
    inner: T,
    stage: String,
    mode: TrackingMode,
    metrics: StageMetrics,
    records_in: u64,
    records_out: u64,
}

impl<T> TrackedTransform<T> {
    /// Wraps `inner`, counting according to `mode`.
    #[must_use]
    pub fn new(inner: T, mode: TrackingMode, metrics: StageMetrics) -> Self {
        Self {
            inner,
            stage: metrics.stage().to_string(),
            mode,
            metrics,
            records_in: 0,
            records_out: 0,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Returns the tracking mode.
    #[must_use]
    pub const fn mode(&self) -> TrackingMode {
        self.mode
    }

    /// Returns the number of records counted in.
    #[must_use]
    pub const fn records_in(&self) -> u64 {
        self.records_in
    }

    /// Returns the number of records counted out.
    #[must_use]
    pub const fn records_out(&self) -> u64 {
        self.records_out
    }

    /// Returns the wrapped transformation.
    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Runs the wrapped transformation on one input.
    ///
    /// The input is counted before the call, so a failing record is still
    /// counted in. Outputs emitted before a failure reach `emitter` and are
    /// counted.
    pub fn transform<In, Out>(
        &mut self,
        input: In,
        emitter: &mut dyn Emitter<Out>,
    ) -> Result<(), TransformationError>
    where
        T: Transformation<In, Out>,
    {
        if self.mode.counts_in() {
            self.records_in += 1;
            self.metrics.records_in(1);
        }

        let operation = self.inner.operation();
        let result = if self.mode.counts_out() {
            let mut counting = CountingEmitter::new(emitter);
            let result = self.inner.transform(input, &mut counting);
            let emitted = counting.count();
            self.records_out += emitted;
            self.metrics.records_out(emitted);
            result
        } else {
            self.inner.transform(input, emitter)
        };

        result.map_err(|source| self.failure(operation, source))
    }

    fn failure(&self, operation: StageOperation, source: anyhow::Error) -> TransformationError {
        tracing::debug!(stage = %self.stage, %operation, error = %source, "Transformation failed");
        TransformationError::new(self.stage.clone(), operation, source)
    }
}

impl<T> fmt::Debug for TrackedTransform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedTransform")
            .field("stage", &self.stage)
            .field("mode", &self.mode)
            .field("records_in", &self.records_in)
            .field("records_out", &self.records_out)
            .finish_non_exhaustive()
    }
}
