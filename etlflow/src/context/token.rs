//! Workflow token shared by the stages of one run.

use serde::{Deserialize, Serialize};

/// One value written to the workflow token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// The node (stage or program) that wrote the value.
    pub node: String,
    /// The key.
    pub key: String,
    /// The value.
    pub value: String,
}

/// An append-only log of values written during one logical run.
///
/// Later writes to a key shadow earlier ones for readers, but nothing is
/// overwritten: the full history stays available through [`Self::entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowToken {
    entries: Vec<TokenEntry>,
}

impl WorkflowToken {
    /// Creates an empty token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value written by `node`.
    pub fn put(&mut self, node: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(TokenEntry {
            node: node.into(),
            key: key.into(),
            value: value.into(),
        });
    }

    /// Appends a value, builder style.
    #[must_use]
    pub fn with_value(
        mut self,
        node: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.put(node, key, value);
        self
    }

    /// Returns the latest value written for `key` by any node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Returns the latest value written for `key` by `node`.
    #[must_use]
    pub fn get_from(&self, key: &str, node: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.key == key && entry.node == node)
            .map(|entry| entry.value.as_str())
    }

    /// Returns every value written for `key`, oldest first.
    #[must_use]
    pub fn history(&self, key: &str) -> Vec<&TokenEntry> {
        self.entries.iter().filter(|entry| entry.key == key).collect()
    }

    /// Returns all entries in write order.
    #[must_use]
    pub fn entries(&self) -> &[TokenEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
