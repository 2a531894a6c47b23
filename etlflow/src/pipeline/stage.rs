//! Planned stages.

use crate::config::{StageConfiguration, StageDefinition};
use crate::core::{Phase, PluginCategory};
use serde::{Deserialize, Serialize};

/// A stage as placed in one physical task: its plugin, raw configuration and
/// the phase it executes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    /// The stage name.
    pub name: String,
    /// The plugin name.
    pub plugin_name: String,
    /// The plugin category.
    pub category: PluginCategory,
    /// Raw configuration, possibly containing macros.
    #[serde(default)]
    pub config: StageConfiguration,
    /// Where the stage executes relative to the grouping boundary.
    pub phase: Phase,
}

impl PipelineStage {
    /// Creates a stage without configuration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        plugin_name: impl Into<String>,
        category: PluginCategory,
        phase: Phase,
    ) -> Self {
        Self {
            name: name.into(),
            plugin_name: plugin_name.into(),
            category,
            config: StageConfiguration::new(),
            phase,
        }
    }

    /// Places a stage definition in `phase`.
    #[must_use]
    pub fn from_definition(definition: &StageDefinition, phase: Phase) -> Self {
        Self {
            name: definition.name.clone(),
            plugin_name: definition.plugin.name.clone(),
            category: definition.plugin.category,
            config: definition.plugin.properties.clone(),
            phase,
        }
    }

    /// Sets a raw configuration property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.with_property(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_definition() {
        let definition = StageDefinition::new("src", "memory", PluginCategory::Source)
            .with_property("path", "${input}");
        let stage = PipelineStage::from_definition(&definition, Phase::BeforeBreak);

        assert_eq!(stage.name, "src");
        assert_eq!(stage.plugin_name, "memory");
        assert_eq!(stage.category, PluginCategory::Source);
        assert_eq!(stage.config.get("path"), Some("${input}"));
        assert_eq!(stage.phase, Phase::BeforeBreak);
    }
}
