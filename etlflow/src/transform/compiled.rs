//! Compiled stages, tagged by execution role.

use super::{
    IdentityTransform, PluginTransform, PostGroupTransform, PreGroupTransform, TrackedTransform,
};
use crate::core::{Phase, PluginCategory, Record, StageRole};
use crate::errors::EtlError;
use crate::pipeline::PipelineStage;
use crate::plugin::{Emitter, RecordAggregator};
use std::fmt;

/// The role-specific transformation of a compiled stage.
pub enum CompiledTransform {
    /// Map-side aggregator half.
    PreGroup(TrackedTransform<PreGroupTransform<Box<RecordAggregator>>>),
    /// Reduce-side aggregator half.
    PostGroup(TrackedTransform<PostGroupTransform<Box<RecordAggregator>>>),
    /// A counting pass-through for a compute stage.
    Identity(StageRole, TrackedTransform<IdentityTransform>),
    /// A source, transform or sink plugin.
    General(TrackedTransform<PluginTransform>),
}

impl CompiledTransform {
    /// Returns the execution role, or `None` for general stages.
    #[must_use]
    pub const fn role(&self) -> Option<StageRole> {
        match self {
            Self::PreGroup(_) => Some(StageRole::PreGroup),
            Self::PostGroup(_) => Some(StageRole::PostGroup),
            Self::Identity(role, _) => Some(*role),
            Self::General(_) => None,
        }
    }

    fn counters(&self) -> (u64, u64) {
        match self {
            Self::PreGroup(t) => (t.records_in(), t.records_out()),
            Self::PostGroup(t) => (t.records_in(), t.records_out()),
            Self::Identity(_, t) => (t.records_in(), t.records_out()),
            Self::General(t) => (t.records_in(), t.records_out()),
        }
    }
}

impl fmt::Display for CompiledTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role() {
            Some(role) => write!(f, "{role}"),
            None => write!(f, "GENERAL"),
        }
    }
}

impl fmt::Debug for CompiledTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (records_in, records_out) = self.counters();
        f.debug_struct("CompiledTransform")
            .field("role", &self.to_string())
            .field("records_in", &records_in)
            .field("records_out", &records_out)
            .finish()
    }
}

/// A stage compiled for one physical task.
#[derive(Debug)]
pub struct CompiledStage {
    stage: PipelineStage,
    transform: CompiledTransform,
}

impl CompiledStage {
    /// Pairs a planned stage with its compiled transformation.
    #[must_use]
    pub const fn new(stage: PipelineStage, transform: CompiledTransform) -> Self {
        Self { stage, transform }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.stage.name
    }

    /// Returns the planned stage.
    #[must_use]
    pub const fn stage(&self) -> &PipelineStage {
        &self.stage
    }

    /// Returns the plugin category.
    #[must_use]
    pub const fn category(&self) -> PluginCategory {
        self.stage.category
    }

    /// Returns the phase the stage was compiled for.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.stage.phase
    }

    /// Returns the execution role, or `None` for general stages.
    #[must_use]
    pub const fn role(&self) -> Option<StageRole> {
        self.transform.role()
    }

    /// Returns the compiled transformation.
    #[must_use]
    pub const fn transformation(&self) -> &CompiledTransform {
        &self.transform
    }

    /// Returns the number of records counted in.
    #[must_use]
    pub fn records_in(&self) -> u64 {
        self.transform.counters().0
    }

    /// Returns the number of records counted out.
    #[must_use]
    pub fn records_out(&self) -> u64 {
        self.transform.counters().1
    }

    /// Runs an identity or general stage on one record.
    pub fn transform(
        &mut self,
        record: Record,
        emitter: &mut dyn Emitter<Record>,
    ) -> Result<(), EtlError> {
        match &mut self.transform {
            CompiledTransform::Identity(_, tracked) => Ok(tracked.transform(record, emitter)?),
            CompiledTransform::General(tracked) => Ok(tracked.transform(record, emitter)?),
            _ => Err(self.mismatch("transform")),
        }
    }

    /// Runs a pre-group stage on one record, emitting `(key, record)` pairs.
    pub fn group_by(
        &mut self,
        record: Record,
        emitter: &mut dyn Emitter<(Record, Record)>,
    ) -> Result<(), EtlError> {
        match &mut self.transform {
            CompiledTransform::PreGroup(tracked) => Ok(tracked.transform(record, emitter)?),
            _ => Err(self.mismatch("groupBy")),
        }
    }

    /// Runs a post-group stage on one group.
    pub fn aggregate<I>(
        &mut self,
        key: Record,
        values: I,
        emitter: &mut dyn Emitter<Record>,
    ) -> Result<(), EtlError>
    where
        I: Iterator<Item = Record>,
    {
        match &mut self.transform {
            CompiledTransform::PostGroup(tracked) => Ok(tracked.transform((key, values), emitter)?),
            _ => Err(self.mismatch("aggregate")),
        }
    }

    fn mismatch(&self, entry: &'static str) -> EtlError {
        EtlError::RoleMismatch {
            stage: self.stage.name.clone(),
            entry,
            compiled: self.transform.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PluginResult;
    use crate::metrics::{NoOpMetrics, StageMetrics};
    use crate::plugin::Aggregator;
    use crate::transform::TrackingMode;
    use serde_json::json;
    use std::sync::Arc;

    struct CountAll;

    impl Aggregator for CountAll {
        type Key = Record;
        type Value = Record;
        type Output = Record;

        fn group_by(&mut self, _input: &Record, keys: &mut dyn Emitter<Record>) -> PluginResult {
            keys.emit(json!("all"));
            Ok(())
        }

        fn aggregate(
            &mut self,
            key: &Record,
            values: &mut dyn Iterator<Item = Record>,
            emitter: &mut dyn Emitter<Record>,
        ) -> PluginResult {
            emitter.emit(json!({"key": key, "count": values.count()}));
            Ok(())
        }
    }

    fn metrics(stage: &str) -> StageMetrics {
        StageMetrics::new(stage, Arc::new(NoOpMetrics))
    }

    fn pre_group() -> CompiledStage {
        let aggregator: Box<RecordAggregator> = Box::new(CountAll);
        CompiledStage::new(
            PipelineStage::new("agg", "count", PluginCategory::Aggregator, Phase::BeforeBreak),
            CompiledTransform::PreGroup(TrackedTransform::new(
                PreGroupTransform::new(aggregator),
                StageRole::PreGroup.tracking_mode(),
                metrics("agg"),
            )),
        )
    }

    fn post_group() -> CompiledStage {
        let aggregator: Box<RecordAggregator> = Box::new(CountAll);
        CompiledStage::new(
            PipelineStage::new("agg", "count", PluginCategory::Aggregator, Phase::AfterBreak),
            CompiledTransform::PostGroup(TrackedTransform::new(
                PostGroupTransform::new(aggregator),
                StageRole::PostGroup.tracking_mode(),
                metrics("agg"),
            )),
        )
    }

    #[test]
    fn test_pre_group_entry() {
        let mut stage = pre_group();
        let mut pairs: Vec<(Record, Record)> = Vec::new();
        stage.group_by(json!({"n": 1}), &mut pairs).unwrap();

        assert_eq!(pairs, vec![(json!("all"), json!({"n": 1}))]);
        assert_eq!(stage.role(), Some(StageRole::PreGroup));
        assert_eq!(stage.records_in(), 1);
        assert_eq!(stage.records_out(), 0);
    }

    #[test]
    fn test_post_group_entry() {
        let mut stage = post_group();
        let mut out: Vec<Record> = Vec::new();
        stage
            .aggregate(json!("all"), vec![json!(1), json!(2)].into_iter(), &mut out)
            .unwrap();

        assert_eq!(out, vec![json!({"key": "all", "count": 2})]);
        assert_eq!(stage.records_in(), 0);
        assert_eq!(stage.records_out(), 1);
    }

    #[test]
    fn test_wrong_entry_is_rejected() {
        let mut stage = pre_group();
        let mut out: Vec<Record> = Vec::new();
        let err = stage.transform(json!(1), &mut out).unwrap_err();
        assert!(matches!(
            err,
            EtlError::RoleMismatch { entry: "transform", ref compiled, .. } if compiled == "PRE_GROUP"
        ));

        let mut stage = post_group();
        let mut pairs: Vec<(Record, Record)> = Vec::new();
        assert!(stage.group_by(json!(1), &mut pairs).is_err());
    }

    #[test]
    fn test_identity_entry() {
        let mut stage = CompiledStage::new(
            PipelineStage::new("compute", "c", PluginCategory::Compute, Phase::Unsplit),
            CompiledTransform::Identity(
                StageRole::IdentityPassthrough,
                TrackedTransform::new(IdentityTransform, TrackingMode::Both, metrics("compute")),
            ),
        );
        let mut out: Vec<Record> = Vec::new();
        stage.transform(json!(1), &mut out).unwrap();

        assert_eq!(out, vec![json!(1)]);
        assert_eq!(stage.transformation().to_string(), "IDENTITY_PASSTHROUGH");
        assert_eq!((stage.records_in(), stage.records_out()), (1, 1));
    }
}
