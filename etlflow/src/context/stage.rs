//! The immutable context handed to a stage's `initialize`.

use super::RuntimeArguments;
use crate::config::ResolvedConfiguration;
use crate::metrics::StageMetrics;
use anyhow::Context as _;
use chrono::{DateTime, TimeZone, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// Per-stage execution context.
///
/// Built once per stage per task, after configuration resolution and before
/// any record reaches the stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    stage_name: String,
    config: ResolvedConfiguration,
    metrics: StageMetrics,
    logical_start_time: i64,
    arguments: Arc<RuntimeArguments>,
}

impl StageContext {
    /// Builds a stage context.
    #[must_use]
    pub fn build(
        stage_name: impl Into<String>,
        config: ResolvedConfiguration,
        metrics: StageMetrics,
        logical_start_time: i64,
        arguments: Arc<RuntimeArguments>,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            config,
            metrics,
            logical_start_time,
            arguments,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &ResolvedConfiguration {
        &self.config
    }

    /// Gets a configuration property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.config.get(name)
    }

    /// Gets a configuration property that must be present.
    pub fn require(&self, name: &str) -> anyhow::Result<&str> {
        self.config
            .get(name)
            .with_context(|| format!("stage '{}' requires property '{name}'", self.stage_name))
    }

    /// Parses an optional configuration property.
    pub fn parse<T>(&self, name: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.config
            .get(name)
            .map(|raw| {
                raw.parse::<T>().with_context(|| {
                    format!("stage '{}' property '{name}' has invalid value '{raw}'", self.stage_name)
                })
            })
            .transpose()
    }

    /// Returns the stage's metrics emitter.
    #[must_use]
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Returns the logical start time in epoch milliseconds.
    #[must_use]
    pub fn logical_start_time(&self) -> i64 {
        self.logical_start_time
    }

    /// Returns the logical start time as a UTC timestamp.
    #[must_use]
    pub fn logical_start_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.logical_start_time).single()
    }

    /// Returns the runtime arguments.
    #[must_use]
    pub fn arguments(&self) -> &RuntimeArguments {
        &self.arguments
    }

    /// Gets a runtime argument.
    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key)
    }
}
