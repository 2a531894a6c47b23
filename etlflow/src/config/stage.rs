//! Raw and resolved stage configuration.

use crate::errors::MacroFailure;
use crate::macros::placeholders;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stage properties as written in the pipeline definition.
///
/// Values may contain macro placeholders that are only resolved when a task
/// is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageConfiguration {
    properties: BTreeMap<String, String>,
}

impl StageConfiguration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Gets a raw property value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Iterates over properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if no property is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Returns the outermost placeholders of every property, by property name.
    ///
    /// Properties without placeholders are omitted.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first property holding a malformed macro.
    pub fn macros(&self) -> Result<BTreeMap<String, Vec<String>>, MacroFailure> {
        let mut found = BTreeMap::new();
        for (name, value) in &self.properties {
            let macros = placeholders(value)?;
            if !macros.is_empty() {
                found.insert(name.clone(), macros);
            }
        }
        Ok(found)
    }

    /// Returns true if any property holds a placeholder.
    #[must_use]
    pub fn contains_macros(&self) -> bool {
        self.properties
            .values()
            .any(|value| placeholders(value).map_or(true, |found| !found.is_empty()))
    }
}

impl<K, V> FromIterator<(K, V)> for StageConfiguration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Stage properties with every placeholder substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedConfiguration {
    properties: BTreeMap<String, String>,
}

impl ResolvedConfiguration {
    pub(crate) fn from_resolved(properties: BTreeMap<String, String>) -> Self {
        Self { properties }
    }

    /// Builds a configuration from values taken verbatim, without resolution.
    #[must_use]
    pub fn literal<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Gets a property value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Gets a property value or a default.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Iterates over properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if no property is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_are_listed_per_property() {
        let config = StageConfiguration::new()
            .with_property("path", "/data/${env}/${logicalStartTime(yyyy)}")
            .with_property("field", "category");

        let macros = config.macros().unwrap();
        assert_eq!(macros.len(), 1);
        assert_eq!(
            macros.get("path").unwrap(),
            &vec!["env".to_string(), "logicalStartTime(yyyy)".to_string()]
        );
        assert!(config.contains_macros());
    }

    #[test]
    fn test_plain_configuration_has_no_macros() {
        let config: StageConfiguration = [("field", "category")].into_iter().collect();
        assert!(!config.contains_macros());
        assert_eq!(config.get("field"), Some("category"));
    }

    #[test]
    fn test_resolved_lookups() {
        let resolved = ResolvedConfiguration::literal([("field", "category")]);
        assert_eq!(resolved.get("field"), Some("category"));
        assert_eq!(resolved.get_or("sum", "count"), "count");
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_configuration_deserializes_from_map() {
        let config: StageConfiguration =
            serde_json::from_str(r#"{"field": "category", "path": "${input}"}"#).unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("path"), Some("${input}"));
    }
}
