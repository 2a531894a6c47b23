//! Stage role classification.

use crate::core::{Phase, PluginCategory, StageRole};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::transform::TrackingMode;

/// How a stage is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// A boundary-adjacent stage with a dedicated execution role.
    Role(StageRole),
    /// A record-at-a-time stage handled by the general builder.
    General,
}

impl Classification {
    /// Returns the counting mode for a stage of `category` with this
    /// classification.
    ///
    /// General sources only produce and general sinks only consume.
    #[must_use]
    pub const fn tracking_mode(self, category: PluginCategory) -> TrackingMode {
        match self {
            Self::Role(role) => role.tracking_mode(),
            Self::General => match category {
                PluginCategory::Source => TrackingMode::OutOnly,
                PluginCategory::Sink | PluginCategory::ComputeSink => TrackingMode::InOnly,
                _ => TrackingMode::Both,
            },
        }
    }

    /// Returns the role, if any.
    #[must_use]
    pub const fn role(self) -> Option<StageRole> {
        match self {
            Self::Role(role) => Some(role),
            Self::General => None,
        }
    }
}

/// Decides the execution role of a stage from its category and phase.
///
/// # Errors
///
/// Returns a `PipelineValidationError` for an aggregator outside a split
/// pipeline and for a compute sink after the break.
pub fn classify(
    category: PluginCategory,
    phase: Phase,
) -> Result<Classification, PipelineValidationError> {
    let role = match (category, phase) {
        (PluginCategory::Aggregator, Phase::BeforeBreak) => StageRole::PreGroup,
        (PluginCategory::Aggregator, Phase::AfterBreak) => StageRole::PostGroup,
        (PluginCategory::Aggregator, Phase::Unsplit) => {
            return Err(rejected(
                "CLASSIFY-001-UNSPLIT_AGGREGATOR",
                "Aggregator outside a grouping boundary",
                format!("A {category} stage always spans a grouping boundary and cannot run unsplit"),
                "Compile the aggregator as part of a map task and a reduce task.",
            ));
        }
        (PluginCategory::ComputeSink, Phase::BeforeBreak | Phase::Unsplit) => StageRole::IdentityIn,
        (PluginCategory::ComputeSink, Phase::AfterBreak) => {
            return Err(rejected(
                "CLASSIFY-002-SINK_AFTER_BREAK",
                "Compute sink after the break",
                format!("A {category} stage terminates the map task and has no reduce-side half"),
                "Compile the compute sink only as part of the map task.",
            ));
        }
        (PluginCategory::Compute, Phase::BeforeBreak) => StageRole::IdentityIn,
        (PluginCategory::Compute, Phase::AfterBreak) => StageRole::IdentityOut,
        (PluginCategory::Compute, Phase::Unsplit) => StageRole::IdentityPassthrough,
        (PluginCategory::Source | PluginCategory::Transform | PluginCategory::Sink, _) => {
            return Ok(Classification::General);
        }
    };
    Ok(Classification::Role(role))
}

fn rejected(code: &str, summary: &str, message: String, hint: &str) -> PipelineValidationError {
    PipelineValidationError::new(message)
        .with_error_info(ContractErrorInfo::new(code, summary).with_fix_hint(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASES: [Phase; 3] = [Phase::BeforeBreak, Phase::AfterBreak, Phase::Unsplit];

    fn role(category: PluginCategory, phase: Phase) -> Option<StageRole> {
        classify(category, phase).unwrap().role()
    }

    #[test]
    fn test_aggregator_roles() {
        assert_eq!(
            role(PluginCategory::Aggregator, Phase::BeforeBreak),
            Some(StageRole::PreGroup)
        );
        assert_eq!(
            role(PluginCategory::Aggregator, Phase::AfterBreak),
            Some(StageRole::PostGroup)
        );
        let err = classify(PluginCategory::Aggregator, Phase::Unsplit).unwrap_err();
        assert_eq!(err.code(), Some("CLASSIFY-001-UNSPLIT_AGGREGATOR"));
    }

    #[test]
    fn test_compute_roles() {
        assert_eq!(
            role(PluginCategory::Compute, Phase::BeforeBreak),
            Some(StageRole::IdentityIn)
        );
        assert_eq!(
            role(PluginCategory::Compute, Phase::AfterBreak),
            Some(StageRole::IdentityOut)
        );
        assert_eq!(
            role(PluginCategory::Compute, Phase::Unsplit),
            Some(StageRole::IdentityPassthrough)
        );
    }

    #[test]
    fn test_compute_sink_roles() {
        assert_eq!(
            role(PluginCategory::ComputeSink, Phase::BeforeBreak),
            Some(StageRole::IdentityIn)
        );
        assert_eq!(
            role(PluginCategory::ComputeSink, Phase::Unsplit),
            Some(StageRole::IdentityIn)
        );
        let err = classify(PluginCategory::ComputeSink, Phase::AfterBreak).unwrap_err();
        assert_eq!(err.code(), Some("CLASSIFY-002-SINK_AFTER_BREAK"));
    }

    #[test]
    fn test_general_categories() {
        for category in [
            PluginCategory::Source,
            PluginCategory::Transform,
            PluginCategory::Sink,
        ] {
            for phase in PHASES {
                assert_eq!(classify(category, phase).unwrap(), Classification::General);
            }
        }
    }

    #[test]
    fn test_classification_is_pure() {
        for category in PluginCategory::ALL {
            for phase in PHASES {
                let first = classify(category, phase).ok();
                for _ in 0..3 {
                    assert_eq!(classify(category, phase).ok(), first);
                }
            }
        }
    }

    #[test]
    fn test_general_tracking_modes() {
        assert_eq!(
            Classification::General.tracking_mode(PluginCategory::Source),
            TrackingMode::OutOnly
        );
        assert_eq!(
            Classification::General.tracking_mode(PluginCategory::Sink),
            TrackingMode::InOnly
        );
        assert_eq!(
            Classification::General.tracking_mode(PluginCategory::Transform),
            TrackingMode::Both
        );
        assert_eq!(
            Classification::Role(StageRole::PostGroup).tracking_mode(PluginCategory::Aggregator),
            TrackingMode::OutOnly
        );
    }
}
