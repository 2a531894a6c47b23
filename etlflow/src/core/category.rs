//! Plugin categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The declared category of a stage plugin.
///
/// `Compute` and `ComputeSink` are the compute-class categories: they operate
/// on a whole dataset and therefore always sit on a grouping boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginCategory {
    /// Reads records into the pipeline.
    #[serde(rename = "batchsource")]
    Source,
    /// Transforms one record into zero or more records.
    #[serde(rename = "transform")]
    Transform,
    /// Operates on a whole dataset outside the record-at-a-time contract.
    #[serde(rename = "sparkcompute")]
    Compute,
    /// Groups records by key and aggregates each group.
    #[serde(rename = "batchaggregator")]
    Aggregator,
    /// Writes records out of the pipeline.
    #[serde(rename = "batchsink")]
    Sink,
    /// A sink that consumes a whole dataset.
    #[serde(rename = "sparksink")]
    ComputeSink,
}

impl PluginCategory {
    /// All categories, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Source,
        Self::Transform,
        Self::Compute,
        Self::Aggregator,
        Self::Sink,
        Self::ComputeSink,
    ];

    /// Returns the plugin type string used in pipeline definitions.
    #[must_use]
    pub const fn plugin_type(self) -> &'static str {
        match self {
            Self::Source => "batchsource",
            Self::Transform => "transform",
            Self::Compute => "sparkcompute",
            Self::Aggregator => "batchaggregator",
            Self::Sink => "batchsink",
            Self::ComputeSink => "sparksink",
        }
    }

    /// Returns true if stages of this category introduce a grouping boundary.
    #[must_use]
    pub const fn is_boundary(self) -> bool {
        matches!(self, Self::Compute | Self::Aggregator | Self::ComputeSink)
    }

    /// Returns true if the category consumes records without producing any.
    #[must_use]
    pub const fn is_sink(self) -> bool {
        matches!(self, Self::Sink | Self::ComputeSink)
    }

    /// Returns true if the category produces records without consuming any.
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::Source)
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plugin_type())
    }
}

impl FromStr for PluginCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.plugin_type() == s)
            .ok_or_else(|| format!("unknown plugin type '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_type_round_trip() {
        for category in PluginCategory::ALL {
            assert_eq!(category.plugin_type().parse::<PluginCategory>(), Ok(category));
        }
        assert!("realtimesource".parse::<PluginCategory>().is_err());
    }

    #[test]
    fn test_boundary_categories() {
        assert!(PluginCategory::Aggregator.is_boundary());
        assert!(PluginCategory::Compute.is_boundary());
        assert!(PluginCategory::ComputeSink.is_boundary());
        assert!(!PluginCategory::Transform.is_boundary());
        assert!(!PluginCategory::Sink.is_boundary());
    }

    #[test]
    fn test_category_serialize() {
        let json = serde_json::to_string(&PluginCategory::Aggregator).unwrap();
        assert_eq!(json, r#""batchaggregator""#);

        let category: PluginCategory = serde_json::from_str(r#""sparksink""#).unwrap();
        assert_eq!(category, PluginCategory::ComputeSink);
    }
}
