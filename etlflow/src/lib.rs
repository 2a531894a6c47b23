//! # Etlflow
//!
//! A stage transformation compiler for batch data pipelines.
//!
//! Etlflow turns a logical pipeline definition into the executable
//! transformations each distributed task runs:
//!
//! - **Planning**: Validate the stage DAG and split it at its single grouping
//!   boundary into a map task and a reduce task
//! - **Macro resolution**: Substitute runtime arguments, workflow token values
//!   and `logicalStartTime` into stage properties before instantiation
//! - **Role classification**: Derive each stage's execution role from its
//!   plugin category and break phase
//! - **Record tracking**: Count records in and out of every compiled stage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etlflow::prelude::*;
//!
//! let config = PipelineConfig::from_path("pipeline.json")?;
//! let plan = PipelinePlan::from_config(&config)?;
//!
//! let compiler = TransformCompiler::new(Arc::new(registry))
//!     .with_arguments(RuntimeArguments::from_map([("input.dir", "/landing")]));
//!
//! // Every map task compiles its own stage instances.
//! let stages = compiler.compile_task(&plan.map_task())?;
//! let mut executor = TransformExecutor::new(stages, &plan);
//! executor.run_source("source", record)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod compiler;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod macros;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod plugin;
pub mod testing;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compiler::{classify, Classification, TransformCompiler};
    pub use crate::config::{
        LoggingConfig, PipelineConfig, ResolvedConfiguration, StageConfiguration,
        StageDefinition,
    };
    pub use crate::context::{RuntimeArguments, StageContext, WorkflowToken};
    pub use crate::core::{Phase, PluginCategory, Record, StageRole};
    pub use crate::errors::{
        EtlError, PipelineValidationError, PluginResult, StageInitializationError,
        TransformationError, UnresolvedMacroError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{TaskOutput, TransformExecutor};
    pub use crate::metrics::{InMemoryMetrics, MetricsCollector, StageMetrics};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{PipelinePlan, PipelineStage};
    pub use crate::plugin::{Aggregator, Emitter, PluginRegistry, Transform};
    pub use crate::transform::{CompiledStage, TrackingMode};
}
