//! Metrics collector trait and implementations.

use dashmap::DashMap;
use std::collections::BTreeMap;

/// Receives counter and gauge updates for scoped metric names.
///
/// A single collector may be shared by every task running in a process, so
/// implementations must tolerate concurrent calls.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsCollector: Send + Sync {
    /// Adds `delta` to the counter `name` within `scope`.
    fn count(&self, scope: &str, name: &str, delta: u64);

    /// Sets the gauge `name` within `scope` to `value`.
    fn gauge(&self, scope: &str, name: &str, value: i64);
}

/// A collector that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsCollector for NoOpMetrics {
    fn count(&self, _scope: &str, _name: &str, _delta: u64) {}

    fn gauge(&self, _scope: &str, _name: &str, _value: i64) {}
}

/// An in-memory collector keyed by `(scope, name)`.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: DashMap<(String, String), u64>,
    gauges: DashMap<(String, String), i64>,
}

impl InMemoryMetrics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value of a counter, zero if never incremented.
    #[must_use]
    pub fn counter(&self, scope: &str, name: &str) -> u64 {
        self.counters
            .get(&(scope.to_string(), name.to_string()))
            .map_or(0, |value| *value)
    }

    /// Returns the last value of a gauge.
    #[must_use]
    pub fn gauge_value(&self, scope: &str, name: &str) -> Option<i64> {
        self.gauges
            .get(&(scope.to_string(), name.to_string()))
            .map(|value| *value)
    }

    /// Sums a counter over every scope.
    #[must_use]
    pub fn total(&self, name: &str) -> u64 {
        self.counters
            .iter()
            .filter(|entry| entry.key().1 == name)
            .map(|entry| *entry.value())
            .sum()
    }

    /// Returns a sorted copy of all counters as `scope.name -> value`.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| {
                let (scope, name) = entry.key();
                (format!("{scope}.{name}"), *entry.value())
            })
            .collect()
    }

    /// Clears all counters and gauges.
    pub fn clear(&self) {
        self.counters.clear();
        self.gauges.clear();
    }
}

impl MetricsCollector for InMemoryMetrics {
    fn count(&self, scope: &str, name: &str, delta: u64) {
        *self
            .counters
            .entry((scope.to_string(), name.to_string()))
            .or_insert(0) += delta;
    }

    fn gauge(&self, scope: &str, name: &str, value: i64) {
        self.gauges
            .insert((scope.to_string(), name.to_string()), value);
    }
}
