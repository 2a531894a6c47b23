//! Pipeline planning.
//!
//! This module provides:
//! - Planned stages tagged with their break phase
//! - Validation of pipeline definitions into a single-boundary DAG
//! - The split into map-task and reduce-task stage lists

mod plan;
mod stage;

pub use plan::PipelinePlan;
pub use stage::PipelineStage;
