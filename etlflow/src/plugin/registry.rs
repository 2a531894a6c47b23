//! Plugin instantiation.

use super::{RecordAggregator, Transform};
use crate::config::ResolvedConfiguration;
use crate::core::PluginCategory;
use crate::pipeline::PipelineStage;
use anyhow::bail;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A freshly created plugin, before initialization.
pub enum PluginInstance {
    /// A record-at-a-time stage.
    Transform(Box<dyn Transform>),
    /// A grouping stage.
    Aggregator(Box<RecordAggregator>),
}

impl PluginInstance {
    /// Returns a short name of the instance kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transform(_) => "transform",
            Self::Aggregator(_) => "aggregator",
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginInstance").field(&self.kind()).finish()
    }
}

/// Creates plugin instances for stages.
///
/// Discovery and class loading live behind this seam; the compiler only asks
/// for a new instance of a stage's plugin with its resolved configuration.
pub trait PluginInstantiator: Send + Sync {
    /// Creates a new, uninitialized instance for `stage`.
    fn instantiate(
        &self,
        stage: &PipelineStage,
        config: &ResolvedConfiguration,
    ) -> anyhow::Result<PluginInstance>;
}

/// Factory function type for creating plugins.
pub type PluginFactory =
    Arc<dyn Fn(&ResolvedConfiguration) -> anyhow::Result<PluginInstance> + Send + Sync>;

/// An in-process registry of plugin factories keyed by category and name.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<HashMap<(PluginCategory, String), PluginFactory>>,
}

impl PluginRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a plugin.
    pub fn register<F>(&self, category: PluginCategory, name: impl Into<String>, factory: F)
    where
        F: Fn(&ResolvedConfiguration) -> anyhow::Result<PluginInstance> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert((category, name.into()), Arc::new(factory));
    }

    /// Registers a record-at-a-time plugin.
    pub fn register_transform<T, F>(&self, category: PluginCategory, name: impl Into<String>, factory: F)
    where
        T: Transform + 'static,
        F: Fn(&ResolvedConfiguration) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(category, name, move |config| {
            Ok(PluginInstance::Transform(Box::new(factory(config)?)))
        });
    }

    /// Registers an aggregator plugin.
    pub fn register_aggregator<A, F>(&self, name: impl Into<String>, factory: F)
    where
        A: crate::plugin::Aggregator<
                Key = crate::core::Record,
                Value = crate::core::Record,
                Output = crate::core::Record,
            > + 'static,
        F: Fn(&ResolvedConfiguration) -> anyhow::Result<A> + Send + Sync + 'static,
    {
        self.register(PluginCategory::Aggregator, name, move |config| {
            Ok(PluginInstance::Aggregator(Box::new(factory(config)?)))
        });
    }

    /// Checks if a plugin is registered.
    #[must_use]
    pub fn contains(&self, category: PluginCategory, name: &str) -> bool {
        self.factories
            .read()
            .contains_key(&(category, name.to_string()))
    }

    /// Lists registered plugins as `type:name`, sorted.
    #[must_use]
    pub fn list_plugins(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .keys()
            .map(|(category, name)| format!("{category}:{name}"))
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.list_plugins())
            .finish()
    }
}

impl PluginInstantiator for PluginRegistry {
    fn instantiate(
        &self,
        stage: &PipelineStage,
        config: &ResolvedConfiguration,
    ) -> anyhow::Result<PluginInstance> {
        let factory = self
            .factories
            .read()
            .get(&(stage.category, stage.plugin_name.clone()))
            .cloned();
        match factory {
            Some(factory) => factory(config),
            None => bail!(
                "no {} plugin named '{}' is registered",
                stage.category,
                stage.plugin_name
            ),
        }
    }
}
