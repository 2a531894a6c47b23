//! Compilation of planned stages into tracked transformation units.
//!
//! For every stage of a physical task the compiler resolves configuration
//! macros, classifies the stage into an execution role, instantiates and
//! initializes its plugin where the role needs one, and wraps the
//! role-specific transformation in a tracked transform.

mod classifier;
mod stage_compiler;

pub use classifier::{classify, Classification};
pub use stage_compiler::TransformCompiler;
