//! Resolution of whole stage configurations.

use super::{substitute, DefaultMacroEvaluator, MacroEvaluator};
use crate::config::{ResolvedConfiguration, StageConfiguration};
use crate::context::{RuntimeArguments, WorkflowToken};
use crate::errors::UnresolvedMacroError;
use std::collections::BTreeMap;

/// Resolves every property of `raw` against the state of one run.
///
/// Resolution is total: either every placeholder is substituted or the first
/// failure is returned, naming the property.
///
/// # Errors
///
/// Returns `UnresolvedMacroError` if any placeholder cannot be resolved.
pub fn resolve(
    raw: &StageConfiguration,
    arguments: &RuntimeArguments,
    token: &WorkflowToken,
    logical_start_time: i64,
) -> Result<ResolvedConfiguration, UnresolvedMacroError> {
    let evaluator = DefaultMacroEvaluator::new(arguments, token, logical_start_time);
    resolve_with(raw, &evaluator)
}

/// Resolves every property of `raw` with a custom evaluator.
///
/// # Errors
///
/// Returns `UnresolvedMacroError` if any placeholder cannot be resolved.
pub fn resolve_with(
    raw: &StageConfiguration,
    evaluator: &dyn MacroEvaluator,
) -> Result<ResolvedConfiguration, UnresolvedMacroError> {
    let mut resolved = BTreeMap::new();
    for (name, value) in raw.iter() {
        let value = substitute(value, evaluator)
            .map_err(|reason| UnresolvedMacroError::new(reason).with_property(name))?;
        resolved.insert(name.to_string(), value);
    }
    Ok(ResolvedConfiguration::from_resolved(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MacroFailure;
    use pretty_assertions::assert_eq;

    const START: i64 = 1_451_606_400_000;

    #[test]
    fn test_resolves_all_placeholder_kinds() {
        let raw = StageConfiguration::new()
            .with_property("path", "/data/${env}/${logicalStartTime(%Y%m%d)}")
            .with_property("expected", "${token(rows, ingest)}")
            .with_property("started", "${logicalStartTime}")
            .with_property("field", "category");
        let args = RuntimeArguments::from_map([("env", "prod")]);
        let token = WorkflowToken::new().with_value("ingest", "rows", "42");

        let resolved = resolve(&raw, &args, &token, START).unwrap();

        assert_eq!(resolved.get("path"), Some("/data/prod/20160101"));
        assert_eq!(resolved.get("expected"), Some("42"));
        assert_eq!(resolved.get("started"), Some("1451606400000"));
        assert_eq!(resolved.get("field"), Some("category"));
    }

    #[test]
    fn test_missing_argument_names_property() {
        let raw = StageConfiguration::new().with_property("path", "${input.path}");
        let err = resolve(&raw, &RuntimeArguments::default(), &WorkflowToken::new(), START)
            .unwrap_err();

        assert_eq!(err.property.as_deref(), Some("path"));
        assert_eq!(err.reason, MacroFailure::MissingArgument("input.path".to_string()));
        assert!(err.stage.is_none());
    }

    #[test]
    fn test_resolution_is_pure() {
        let raw = StageConfiguration::new().with_property("p", "${a}-${logicalStartTime(%H)}");
        let args = RuntimeArguments::from_map([("a", "x")]);
        let token = WorkflowToken::new();

        let first = resolve(&raw, &args, &token, START).unwrap();
        let second = resolve(&raw, &args, &token, START).unwrap();
        assert_eq!(first, second);
    }
}
