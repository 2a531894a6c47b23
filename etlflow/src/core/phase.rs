//! Position of a stage relative to the grouping boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the grouping boundary a compiled stage executes on.
///
/// A boundary stage is compiled once per physical task, so the same logical
/// stage carries `BeforeBreak` in the map task and `AfterBreak` in the reduce
/// task of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Executes in the map task, before records are redistributed by key.
    BeforeBreak,
    /// Executes in the reduce task, after records are redistributed by key.
    AfterBreak,
    /// The pipeline has no grouping boundary.
    Unsplit,
}

impl Phase {
    /// Returns true for stages running ahead of the boundary.
    #[must_use]
    pub const fn is_before_break(self) -> bool {
        matches!(self, Self::BeforeBreak)
    }
}

impl From<bool> for Phase {
    fn from(is_before_break: bool) -> Self {
        if is_before_break {
            Self::BeforeBreak
        } else {
            Self::AfterBreak
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeBreak => write!(f, "before_break"),
            Self::AfterBreak => write!(f, "after_break"),
            Self::Unsplit => write!(f, "unsplit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_flag() {
        assert_eq!(Phase::from(true), Phase::BeforeBreak);
        assert_eq!(Phase::from(false), Phase::AfterBreak);
        assert!(Phase::BeforeBreak.is_before_break());
        assert!(!Phase::Unsplit.is_before_break());
    }
}
