//! Serde model of a pipeline definition.

use super::StageConfiguration;
use crate::core::PluginCategory;
use crate::errors::EtlError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The plugin a stage runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    /// The plugin name used to look up its implementation.
    pub name: String,
    /// The plugin category, written as its plugin type string.
    #[serde(rename = "type")]
    pub category: PluginCategory,
    /// Raw plugin properties.
    #[serde(default)]
    pub properties: StageConfiguration,
}

/// One stage of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// The unique stage name.
    pub name: String,
    /// The plugin the stage runs.
    pub plugin: PluginDefinition,
}

impl StageDefinition {
    /// Creates a stage definition without properties.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        plugin_name: impl Into<String>,
        category: PluginCategory,
    ) -> Self {
        Self {
            name: name.into(),
            plugin: PluginDefinition {
                name: plugin_name.into(),
                category,
                properties: StageConfiguration::new(),
            },
        }
    }

    /// Sets a plugin property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.plugin.properties = self.plugin.properties.with_property(name, value);
        self
    }
}

/// A directed edge between two stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// The upstream stage.
    pub from: String,
    /// The downstream stage.
    pub to: String,
}

/// A logical pipeline: stages and the connections between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The pipeline name.
    pub name: String,
    /// The stages, in definition order.
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
    /// The connections between stages.
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl PipelineConfig {
    /// Creates an empty pipeline definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Adds a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }

    /// Adds a connection.
    #[must_use]
    pub fn connect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(Connection {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Parses a pipeline definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::Config` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, EtlError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a pipeline definition from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::Io` if the file cannot be read and
    /// `EtlError::Config` if it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EtlError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|stage| stage.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const PIPELINE: &str = r#"{
        "name": "sales",
        "stages": [
            {"name": "orders", "plugin": {"name": "memory", "type": "batchsource"}},
            {"name": "totals", "plugin": {
                "name": "fieldSum",
                "type": "batchaggregator",
                "properties": {"groupBy": "category", "sum": "count"}
            }},
            {"name": "out", "plugin": {"name": "collect", "type": "batchsink"}}
        ],
        "connections": [
            {"from": "orders", "to": "totals"},
            {"from": "totals", "to": "out"}
        ]
    }"#;

    #[test]
    fn test_parse_pipeline_definition() {
        let config = PipelineConfig::from_json(PIPELINE).unwrap();

        assert_eq!(config.name, "sales");
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.connections.len(), 2);

        let totals = config.stage("totals").unwrap();
        assert_eq!(totals.plugin.category, PluginCategory::Aggregator);
        assert_eq!(totals.plugin.properties.get("sum"), Some("count"));
    }

    #[test]
    fn test_builder_matches_parsed_definition() {
        let built = PipelineConfig::new("sales")
            .with_stage(StageDefinition::new("orders", "memory", PluginCategory::Source))
            .with_stage(
                StageDefinition::new("totals", "fieldSum", PluginCategory::Aggregator)
                    .with_property("groupBy", "category")
                    .with_property("sum", "count"),
            )
            .with_stage(StageDefinition::new("out", "collect", PluginCategory::Sink))
            .connect("orders", "totals")
            .connect("totals", "out");

        assert_eq!(built, PipelineConfig::from_json(PIPELINE).unwrap());
    }

    #[test]
    fn test_unknown_plugin_type_is_config_error() {
        let json = r#"{"name": "p", "stages": [{"name": "s", "plugin": {"name": "x", "type": "realtimesource"}}]}"#;
        let err = PipelineConfig::from_json(json).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PIPELINE.as_bytes()).unwrap();

        let config = PipelineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.name, "sales");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_path("/nonexistent/pipeline.json").unwrap_err();
        assert!(matches!(err, EtlError::Io(_)));
    }
}
