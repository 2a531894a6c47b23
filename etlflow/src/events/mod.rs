//! Compilation and execution events.
//!
//! Events are emitted through an explicitly passed [`EventSink`]; nothing is
//! stored globally.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A stage was compiled into an executable unit.
pub const STAGE_COMPILED: &str = "stage.compiled";

/// A stage failed to compile.
pub const STAGE_FAILED: &str = "stage.failed";

/// Every stage of a physical task was compiled.
pub const TASK_COMPILED: &str = "task.compiled";

/// A physical task finished processing its input.
pub const TASK_COMPLETED: &str = "task.completed";
