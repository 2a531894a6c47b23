//! Core domain model types for etlflow.
//!
//! This module contains the fundamental types used throughout the compiler:
//! - Plugin categories and their plugin type strings
//! - Break phases and stage execution roles
//! - The type-erased record flowing between stages

mod category;
mod phase;
mod role;

pub use category::PluginCategory;
pub use phase::Phase;
pub use role::StageRole;

/// A record flowing between stages of a compiled task.
pub type Record = serde_json::Value;
