//! Runtime state handed to stages.
//!
//! This module provides:
//! - Run-scoped runtime arguments
//! - The append-only workflow token shared by the stages of one run
//! - The immutable per-stage context passed to `initialize`

mod arguments;
mod stage;
mod token;

pub use arguments::RuntimeArguments;
pub use stage::StageContext;
pub use token::{TokenEntry, WorkflowToken};
