//! Macro evaluators.

use super::render_logical_start_time;
use crate::context::{RuntimeArguments, WorkflowToken};
use crate::errors::MacroFailure;

/// Name of the logical start time macro, usable bare or as a function.
const LOGICAL_START_TIME: &str = "logicalStartTime";

/// Looks up plain placeholders and evaluates function placeholders.
pub trait MacroEvaluator {
    /// Resolves `${key}`.
    fn lookup(&self, key: &str) -> Result<String, MacroFailure>;

    /// Resolves `${function(args...)}`.
    fn evaluate(&self, function: &str, args: &[String]) -> Result<String, MacroFailure>;
}

/// Resolves macros from runtime arguments, the workflow token and the
/// logical start time of the run.
#[derive(Debug, Clone, Copy)]
pub struct DefaultMacroEvaluator<'a> {
    arguments: &'a RuntimeArguments,
    token: &'a WorkflowToken,
    logical_start_time: i64,
}

impl<'a> DefaultMacroEvaluator<'a> {
    /// Creates an evaluator over the given run state.
    #[must_use]
    pub fn new(
        arguments: &'a RuntimeArguments,
        token: &'a WorkflowToken,
        logical_start_time: i64,
    ) -> Self {
        Self {
            arguments,
            token,
            logical_start_time,
        }
    }

    fn token_value(&self, args: &[String]) -> Result<String, MacroFailure> {
        let value = match args {
            [key] => self.token.get(key),
            [key, node] => self.token.get_from(key, node),
            _ => {
                return Err(MacroFailure::InvalidArguments(format!(
                    "token takes a key and an optional node, got {} arguments",
                    args.len()
                )))
            }
        };
        value
            .map(str::to_string)
            .ok_or_else(|| MacroFailure::MissingTokenValue(args.join("@")))
    }
}

impl MacroEvaluator for DefaultMacroEvaluator<'_> {
    fn lookup(&self, key: &str) -> Result<String, MacroFailure> {
        match self.arguments.get(key) {
            Some(value) => Ok(value.to_string()),
            None if key == LOGICAL_START_TIME => self.evaluate(LOGICAL_START_TIME, &[]),
            None => Err(MacroFailure::MissingArgument(key.to_string())),
        }
    }

    fn evaluate(&self, function: &str, args: &[String]) -> Result<String, MacroFailure> {
        match function {
            LOGICAL_START_TIME => render_logical_start_time(self.logical_start_time, args),
            "token" => self.token_value(args),
            other => Err(MacroFailure::UnknownFunction(other.to_string())),
        }
    }
}
