//! Executable transformation units.
//!
//! Every compiled stage is a [`Transformation`] wrapped in a
//! [`TrackedTransform`]. The role-specific transformations adapt the plugin
//! capabilities to the shape the dataflow engine drives:
//!
//! - [`PreGroupTransform`]: one record in, `(key, record)` pairs out
//! - [`PostGroupTransform`]: one `(key, values)` group in, outputs out
//! - [`IdentityTransform`]: records pass through unchanged
//! - [`PluginTransform`]: a record-at-a-time plugin

mod compiled;
mod grouping;
mod identity;
mod plugin;
mod tracked;

pub use compiled::{CompiledStage, CompiledTransform};
pub use grouping::{PostGroupTransform, PreGroupTransform};
pub use identity::IdentityTransform;
pub use plugin::PluginTransform;
pub use tracked::{CountingEmitter, TrackedTransform, TrackingMode};

use crate::errors::{PluginResult, StageOperation};
use crate::plugin::Emitter;

/// A unit of work turning one input into zero or more outputs.
pub trait Transformation<In, Out>: Send {
    /// Transforms one input.
    fn transform(&mut self, input: In, emitter: &mut dyn Emitter<Out>) -> PluginResult;

    /// The plugin operation this transformation invokes.
    fn operation(&self) -> StageOperation {
        StageOperation::Transform
    }
}
