//! Test fixtures for stage and pipeline tests.

use crate::config::{PipelineConfig, ResolvedConfiguration, StageDefinition};
use crate::context::{RuntimeArguments, StageContext};
use crate::core::{PluginCategory, Record};
use crate::metrics::{NoOpMetrics, StageMetrics};
use serde_json::json;
use std::sync::Arc;

/// Logical start time used by fixtures: 2016-01-01T00:00:00Z.
pub const FIXTURE_START_TIME: i64 = 1_451_606_400_000;

/// Builds a stage context over literal properties, without metrics.
#[must_use]
pub fn stage_context<K, V>(stage: &str, properties: impl IntoIterator<Item = (K, V)>) -> StageContext
where
    K: Into<String>,
    V: Into<String>,
{
    StageContext::build(
        stage,
        ResolvedConfiguration::literal(properties),
        StageMetrics::new(stage, Arc::new(NoOpMetrics)),
        FIXTURE_START_TIME,
        Arc::new(RuntimeArguments::default()),
    )
}

/// The `Source -> Aggregator(sum) -> Sink` pipeline over the sample plugins.
#[must_use]
pub fn sum_pipeline() -> PipelineConfig {
    PipelineConfig::new("category-totals")
        .with_stage(StageDefinition::new("source", "memory", PluginCategory::Source))
        .with_stage(StageDefinition::new("totals", "sum", PluginCategory::Aggregator))
        .with_stage(StageDefinition::new("sink", "memory", PluginCategory::Sink))
        .connect("source", "totals")
        .connect("totals", "sink")
}

/// Records with a `category` and a numeric `count`.
#[must_use]
pub fn category_records(counts: &[(&str, i64)]) -> Vec<Record> {
    counts
        .iter()
        .map(|(category, count)| json!({"category": category, "count": count}))
        .collect()
}
