//! The stage plugin contract.
//!
//! This module provides:
//! - The `Emitter` seam stages write their outputs through
//! - The reusable buffer behind the group-key emitter
//! - The `Transform` and `Aggregator` capabilities a stage implements
//! - The `PluginInstantiator` seam and an in-process registry

mod emitter;
mod registry;
mod traits;

pub use emitter::{BufferedEmitter, Emitter, GroupKeyEmitter};
pub use registry::{PluginFactory, PluginInstance, PluginInstantiator, PluginRegistry};
pub use traits::{Aggregator, RecordAggregator, Transform};
