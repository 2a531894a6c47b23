//! Macro resolution for stage configuration.
//!
//! Placeholders are resolved when a task is compiled, from values passed in
//! explicitly: runtime arguments, the workflow token and the logical start
//! time. Supported forms:
//!
//! - `${key}`: a runtime argument
//! - `${token(key)}` / `${token(key, node)}`: a workflow token value
//! - `${logicalStartTime}`: the start time in epoch milliseconds
//! - `${logicalStartTime(format[, offset[, timezone]])}`: the start time,
//!   shifted back by `offset` and formatted with a strftime pattern
//!
//! Macros nest (`${${env}.path}`) and `\` escapes `$ { } ( ) ,` and itself.

mod evaluator;
mod logical_time;
mod parser;
mod resolver;

pub use evaluator::{DefaultMacroEvaluator, MacroEvaluator};
pub use logical_time::{parse_offset, render_logical_start_time};
pub use parser::{placeholders, substitute, MAX_SUBSTITUTION_DEPTH};
pub use resolver::{resolve, resolve_with};
