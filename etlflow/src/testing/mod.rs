//! Testing utilities for etlflow pipelines.
//!
//! This module provides:
//! - Sample plugins and a registry holding them
//! - Fixtures for stage contexts and pipelines
//! - An in-process engine running map and reduce tasks
//! - Assertions over records and metrics

mod assertions;
mod engine;
mod fixtures;
mod plugins;

pub use assertions::{assert_counter, assert_records_unordered};
pub use engine::{DatasetCompute, LocalEngine, Partition, RunOutput};
pub use fixtures::{category_records, stage_context, sum_pipeline, FIXTURE_START_TIME};
pub use plugins::{
    sample_registry, CountAggregator, FailingTransform, FieldSumAggregator, MemorySink,
    MemorySource, ProjectionTransform, GROUP_BY_FIELD, SUM_FIELD,
};
