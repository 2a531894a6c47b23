//! Error types for the etlflow compiler.
//!
//! Compile-time failures (macro resolution, plan validation, plugin
//! initialization) are kept apart from per-record failures so callers can
//! tell a broken pipeline definition from a broken record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Result type returned by stage plugin code.
pub type PluginResult<T = ()> = anyhow::Result<T>;

/// The main error type for etlflow operations.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A configuration placeholder could not be resolved.
    #[error("{0}")]
    UnresolvedMacro(#[from] UnresolvedMacroError),

    /// A stage failed to initialize.
    #[error("{0}")]
    StageInitialization(#[from] StageInitializationError),

    /// A stage failed while processing a record or a group.
    #[error("{0}")]
    Transformation(#[from] TransformationError),

    /// The pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A compiled stage was driven through an entry point of another role.
    #[error("Stage '{stage}' compiled as {compiled} cannot be driven through {entry}")]
    RoleMismatch {
        /// The stage name.
        stage: String,
        /// The entry point the caller used.
        entry: &'static str,
        /// What the stage was compiled as.
        compiled: String,
    },

    /// A stage was referenced that is not part of the compiled task.
    #[error("Stage '{0}' is not part of this task")]
    UnknownStage(String),

    /// The pipeline configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A task spawned by the local engine did not complete.
    #[error("Task failed: {0}")]
    Task(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    /// Returns the name of the stage the error originated from, if known.
    #[must_use]
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            Self::UnresolvedMacro(err) => err.stage.as_deref(),
            Self::StageInitialization(err) => Some(&err.stage),
            Self::Transformation(err) => Some(&err.stage),
            Self::Validation(err) => err.stages.first().map(String::as_str),
            Self::RoleMismatch { stage, .. } | Self::UnknownStage(stage) => Some(stage),
            Self::Config(_) | Self::Task(_) | Self::Io(_) => None,
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PLAN-002-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Why a macro placeholder could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroFailure {
    /// The runtime argument is not defined.
    MissingArgument(String),
    /// No workflow token value exists for the key.
    MissingTokenValue(String),
    /// The macro function is not known.
    UnknownFunction(String),
    /// The function was called with the wrong arguments.
    InvalidArguments(String),
    /// The placeholder is not closed or otherwise malformed.
    Malformed(String),
    /// Substituted values kept expanding past the depth limit.
    RecursionLimit(usize),
}

impl fmt::Display for MacroFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument(key) => write!(f, "runtime argument '{key}' is not set"),
            Self::MissingTokenValue(key) => write!(f, "workflow token has no value for '{key}'"),
            Self::UnknownFunction(name) => write!(f, "unknown macro function '{name}'"),
            Self::InvalidArguments(detail) => write!(f, "invalid macro arguments: {detail}"),
            Self::Malformed(detail) => write!(f, "malformed macro: {detail}"),
            Self::RecursionLimit(depth) => {
                write!(f, "macro expansion exceeded the maximum depth of {depth}")
            }
        }
    }
}

/// Error raised when a configuration placeholder cannot be resolved.
#[derive(Debug, Clone, Error)]
#[error("Unresolved macro{} in property '{}': {reason}", stage_suffix(.stage.as_deref()), .property.as_deref().unwrap_or("<inline>"))]
pub struct UnresolvedMacroError {
    /// The stage whose configuration failed to resolve.
    pub stage: Option<String>,
    /// The configuration property that contained the macro.
    pub property: Option<String>,
    /// The failure reason.
    pub reason: MacroFailure,
}

fn stage_suffix(stage: Option<&str>) -> String {
    stage.map(|s| format!(" for stage '{s}'")).unwrap_or_default()
}

impl UnresolvedMacroError {
    /// Creates a new unresolved macro error.
    #[must_use]
    pub fn new(reason: MacroFailure) -> Self {
        Self {
            stage: None,
            property: None,
            reason,
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the property name.
    #[must_use]
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }
}

/// Error raised when a stage cannot be instantiated or initialized.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed to initialize: {source}")]
pub struct StageInitializationError {
    /// The stage name.
    pub stage: String,
    /// The underlying cause.
    #[source]
    pub source: anyhow::Error,
}

impl StageInitializationError {
    /// Creates a new initialization error.
    #[must_use]
    pub fn new(stage: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            stage: stage.into(),
            source,
        }
    }
}

/// The stage operation that failed on a record or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOperation {
    /// A plain `transform` call.
    Transform,
    /// An aggregator's `group_by` call.
    GroupBy,
    /// An aggregator's `aggregate` call.
    Aggregate,
}

impl fmt::Display for StageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::GroupBy => write!(f, "groupBy"),
            Self::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Error raised when a stage fails on a record or group.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed in {operation}: {source}")]
pub struct TransformationError {
    /// The stage name.
    pub stage: String,
    /// The operation that failed.
    pub operation: StageOperation,
    /// The underlying cause.
    #[source]
    pub source: anyhow::Error,
}

impl TransformationError {
    /// Creates a new transformation error.
    #[must_use]
    pub fn new(stage: impl Into<String>, operation: StageOperation, source: anyhow::Error) -> Self {
        Self {
            stage: stage.into(),
            operation,
            source,
        }
    }
}
