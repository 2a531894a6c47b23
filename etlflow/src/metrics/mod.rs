//! Stage metrics.
//!
//! This module provides:
//! - The `MetricsCollector` seam a host engine implements
//! - An in-memory collector safe for concurrent increments from many tasks
//! - `StageMetrics`, a collector scoped to one stage name

mod collector;
mod stage;

pub use collector::{InMemoryMetrics, MetricsCollector, NoOpMetrics};
#[cfg(test)]
pub use collector::MockMetricsCollector;
pub use stage::{StageMetrics, RECORDS_IN, RECORDS_OUT};
