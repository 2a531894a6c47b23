//! Pass-through transformation.

use super::Transformation;
use crate::errors::PluginResult;
use crate::plugin::Emitter;

/// Emits every input unchanged.
///
/// Used for compute stages at a boundary: the engine runs the compute
/// itself, and the identity transform only counts what crosses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityTransform;

impl<T> Transformation<T, T> for IdentityTransform {
    fn transform(&mut self, input: T, emitter: &mut dyn Emitter<T>) -> PluginResult {
        emitter.emit(input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_emits_input() {
        let mut identity = IdentityTransform;
        let mut out: Vec<serde_json::Value> = Vec::new();
        identity
            .transform(serde_json::json!({"a": 1}), &mut out)
            .unwrap();
        assert_eq!(out, vec![serde_json::json!({"a": 1})]);
    }
}
