//! Configuration types.
//!
//! This module provides:
//! - Raw and resolved per-stage configuration
//! - The serde model of a pipeline definition
//! - Logging configuration

mod logging;
mod pipeline;
mod stage;

pub use logging::{LogFormat, LoggingConfig};
pub use pipeline::{Connection, PipelineConfig, PluginDefinition, StageDefinition};
pub use stage::{ResolvedConfiguration, StageConfiguration};
