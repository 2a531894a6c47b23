//! Execution of one compiled physical task.

mod task;

pub use task::{TaskOutput, TransformExecutor};
