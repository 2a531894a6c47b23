//! Stage execution roles.

use crate::transform::TrackingMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution role of a boundary-adjacent stage within one physical task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageRole {
    /// Identity transform counting only records flowing into the boundary.
    IdentityIn,
    /// Identity transform counting only records flowing out of the boundary.
    IdentityOut,
    /// Identity transform counting both sides.
    IdentityPassthrough,
    /// Map-side half of an aggregator: emits `(key, record)` pairs.
    PreGroup,
    /// Reduce-side half of an aggregator: aggregates one group.
    PostGroup,
}

impl StageRole {
    /// Returns the counting mode the role's tracked transform uses.
    ///
    /// Key pairs leaving a pre-group stage are not output records of the
    /// aggregator, and groups entering a post-group stage are not input
    /// records, so each half counts only its record-facing side.
    #[must_use]
    pub const fn tracking_mode(self) -> TrackingMode {
        match self {
            Self::IdentityIn | Self::PreGroup => TrackingMode::InOnly,
            Self::IdentityOut | Self::PostGroup => TrackingMode::OutOnly,
            Self::IdentityPassthrough => TrackingMode::Both,
        }
    }

    /// Returns true for the three identity roles.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(
            self,
            Self::IdentityIn | Self::IdentityOut | Self::IdentityPassthrough
        )
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityIn => write!(f, "IDENTITY_IN"),
            Self::IdentityOut => write!(f, "IDENTITY_OUT"),
            Self::IdentityPassthrough => write!(f, "IDENTITY_PASSTHROUGH"),
            Self::PreGroup => write!(f, "PRE_GROUP"),
            Self::PostGroup => write!(f, "POST_GROUP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tracking_modes() {
        assert_eq!(StageRole::IdentityIn.tracking_mode(), TrackingMode::InOnly);
        assert_eq!(StageRole::IdentityOut.tracking_mode(), TrackingMode::OutOnly);
        assert_eq!(StageRole::PreGroup.tracking_mode(), TrackingMode::InOnly);
        assert_eq!(StageRole::PostGroup.tracking_mode(), TrackingMode::OutOnly);
        assert_eq!(StageRole::IdentityPassthrough.tracking_mode(), TrackingMode::Both);
    }

    #[test]
    fn test_role_serialize() {
        let json = serde_json::to_string(&StageRole::PreGroup).unwrap();
        assert_eq!(json, r#""PRE_GROUP""#);
        assert_eq!(StageRole::IdentityPassthrough.to_string(), "IDENTITY_PASSTHROUGH");
    }
}
