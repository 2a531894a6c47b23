//! Record-at-a-time plugins as transformations.

use super::Transformation;
use crate::context::StageContext;
use crate::core::Record;
use crate::errors::PluginResult;
use crate::plugin::{Emitter, Transform};

/// A source, transform or sink plugin driven one record at a time.
pub struct PluginTransform {
    plugin: Box<dyn Transform>,
}

impl PluginTransform {
    /// Wraps a plugin instance.
    #[must_use]
    pub fn new(plugin: Box<dyn Transform>) -> Self {
        Self { plugin }
    }

    /// Initializes the plugin.
    pub fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        self.plugin.initialize(ctx)
    }
}

impl Transformation<Record, Record> for PluginTransform {
    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult {
        self.plugin.transform(input, emitter)
    }
}

impl std::fmt::Debug for PluginTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginTransform").finish_non_exhaustive()
    }
}
