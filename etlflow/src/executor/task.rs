//! Record routing through the stages of a compiled task.

use crate::core::{Record, StageRole};
use crate::errors::EtlError;
use crate::pipeline::PipelinePlan;
use crate::transform::CompiledStage;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// What a task produced for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskOutput {
    /// `(key, record)` pairs from the pre-group stage, to be grouped.
    pub keyed: Vec<(Record, Record)>,
    /// Records handed to a compute stage the engine runs.
    pub boundary: Vec<Record>,
    /// Records reaching each terminal stage, by stage name.
    pub sinks: BTreeMap<String, Vec<Record>>,
}

impl TaskOutput {
    /// Appends another task's output.
    pub fn merge(&mut self, other: Self) {
        self.keyed.extend(other.keyed);
        self.boundary.extend(other.boundary);
        for (stage, records) in other.sinks {
            self.sinks.entry(stage).or_default().extend(records);
        }
    }

    /// Returns the records that reached `stage`.
    #[must_use]
    pub fn sink(&self, stage: &str) -> &[Record] {
        self.sinks.get(stage).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Drives the compiled stages of one task, strictly sequentially.
///
/// Records move depth-first: every output of a stage is pushed through all
/// of its successors in the task before the next output is handled. A stage
/// whose successors all live in another task ends the route there.
#[derive(Debug)]
pub struct TransformExecutor {
    stages: Vec<CompiledStage>,
    index: HashMap<String, usize>,
    successors: Vec<Vec<usize>>,
    boundary: Option<usize>,
    output: TaskOutput,
}

impl TransformExecutor {
    /// Wires compiled stages with the plan's connections.
    ///
    /// Connections to stages outside the task are dropped.
    #[must_use]
    pub fn new(stages: Vec<CompiledStage>, plan: &PipelinePlan) -> Self {
        let index: HashMap<String, usize> = stages
            .iter()
            .enumerate()
            .map(|(i, stage)| (stage.name().to_string(), i))
            .collect();
        let successors: Vec<Vec<usize>> = stages
            .iter()
            .map(|stage| {
                plan.successors(stage.name())
                    .iter()
                    .filter_map(|next| index.get(next).copied())
                    .collect()
            })
            .collect();
        let boundary = stages.iter().position(|stage| {
            matches!(
                stage.role(),
                Some(StageRole::PostGroup | StageRole::IdentityOut)
            )
        });

        let mut output = TaskOutput::default();
        for (i, stage) in stages.iter().enumerate() {
            let collects = !matches!(
                stage.role(),
                Some(StageRole::PreGroup | StageRole::IdentityIn)
            );
            if collects && successors[i].is_empty() {
                output.sinks.insert(stage.name().to_string(), Vec::new());
            }
        }

        Self {
            stages,
            index,
            successors,
            boundary,
            output,
        }
    }

    /// Returns the compiled stages.
    #[must_use]
    pub fn stages(&self) -> &[CompiledStage] {
        &self.stages
    }

    /// Looks up a compiled stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&CompiledStage> {
        self.index.get(name).map(|&i| &self.stages[i])
    }

    /// Returns the output collected so far.
    #[must_use]
    pub const fn output(&self) -> &TaskOutput {
        &self.output
    }

    /// Takes the collected output, leaving an empty one.
    pub fn take_output(&mut self) -> TaskOutput {
        let mut fresh = TaskOutput::default();
        for stage in self.output.sinks.keys() {
            fresh.sinks.insert(stage.clone(), Vec::new());
        }
        std::mem::replace(&mut self.output, fresh)
    }

    /// Pushes one input record through `source` and everything downstream.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::UnknownStage` if `source` is not in the task, or
    /// the first stage failure on the route.
    pub fn run_source(&mut self, source: &str, record: Record) -> Result<(), EtlError> {
        let i = self
            .index
            .get(source)
            .copied()
            .ok_or_else(|| EtlError::UnknownStage(source.to_string()))?;
        self.dispatch(i, record)
    }

    /// Feeds one group into the reduce-side boundary stage.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::Task` if the task has no reduce-side boundary,
    /// `EtlError::RoleMismatch` if the boundary is not a post-group stage,
    /// or the first stage failure on the route.
    pub fn run_group<I>(&mut self, key: Record, values: I) -> Result<(), EtlError>
    where
        I: IntoIterator<Item = Record>,
    {
        let i = self.boundary()?;
        let mut out = Vec::new();
        self.stages[i].aggregate(key, values.into_iter(), &mut out)?;
        self.route(i, out)
    }

    /// Feeds one record produced by an engine-run compute into the
    /// reduce-side boundary stage.
    ///
    /// # Errors
    ///
    /// As for [`Self::run_group`], with a post-group boundary rejected.
    pub fn run_boundary(&mut self, record: Record) -> Result<(), EtlError> {
        let i = self.boundary()?;
        self.dispatch(i, record)
    }

    fn boundary(&self) -> Result<usize, EtlError> {
        self.boundary
            .ok_or_else(|| EtlError::Task("task has no reduce-side boundary stage".to_string()))
    }

    fn dispatch(&mut self, i: usize, record: Record) -> Result<(), EtlError> {
        trace!(stage = %self.stages[i].name(), "Dispatching record");
        match self.stages[i].role() {
            Some(StageRole::PreGroup) => self.stages[i].group_by(record, &mut self.output.keyed),
            Some(StageRole::IdentityIn) => self.stages[i].transform(record, &mut self.output.boundary),
            _ => {
                let mut out = Vec::new();
                self.stages[i].transform(record, &mut out)?;
                self.route(i, out)
            }
        }
    }

    fn route(&mut self, i: usize, records: Vec<Record>) -> Result<(), EtlError> {
        let fanout = self.successors[i].len();
        if fanout == 0 {
            if !records.is_empty() {
                self.output
                    .sinks
                    .entry(self.stages[i].name().to_string())
                    .or_default()
                    .extend(records);
            }
            return Ok(());
        }

        for record in records {
            for j in 0..fanout - 1 {
                let next = self.successors[i][j];
                self.dispatch(next, record.clone())?;
            }
            let last = self.successors[i][fanout - 1];
            self.dispatch(last, record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TransformCompiler;
    use crate::config::{PipelineConfig, StageDefinition};
    use crate::core::PluginCategory;
    use crate::testing::sample_registry;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn compiler() -> TransformCompiler {
        TransformCompiler::new(Arc::new(sample_registry()))
    }

    fn aggregation_plan() -> PipelinePlan {
        let config = PipelineConfig::new("sales")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("agg", "sum", PluginCategory::Aggregator))
            .with_stage(StageDefinition::new("sink", "memory", PluginCategory::Sink))
            .connect("src", "agg")
            .connect("agg", "sink");
        PipelinePlan::from_config(&config).unwrap()
    }

    #[test]
    fn test_map_task_collects_keyed_pairs() {
        let plan = aggregation_plan();
        let stages = compiler().compile_task(&plan.map_task()).unwrap();
        let mut executor = TransformExecutor::new(stages, &plan);

        executor
            .run_source("src", json!({"category": "A", "count": 3}))
            .unwrap();
        executor
            .run_source("src", json!({"category": "B", "count": 5}))
            .unwrap();

        let output = executor.take_output();
        assert_eq!(
            output.keyed,
            vec![
                (json!("A"), json!({"category": "A", "count": 3})),
                (json!("B"), json!({"category": "B", "count": 5})),
            ]
        );
        assert!(output.sinks.is_empty());
        assert!(executor.output().keyed.is_empty());
    }

    #[test]
    fn test_reduce_task_routes_to_sink() {
        let plan = aggregation_plan();
        let stages = compiler().compile_task(&plan.reduce_task()).unwrap();
        let mut executor = TransformExecutor::new(stages, &plan);

        executor
            .run_group(json!("A"), vec![json!({"count": 3}), json!({"count": 2})])
            .unwrap();

        assert_eq!(executor.output().sink("sink"), [json!({"A": 5})]);
        assert_eq!(executor.stage("agg").unwrap().records_out(), 1);
        assert_eq!(executor.stage("sink").unwrap().records_in(), 1);
    }

    #[test]
    fn test_fan_out_to_every_successor() {
        let config = PipelineConfig::new("fan")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("left", "memory", PluginCategory::Sink))
            .with_stage(StageDefinition::new("right", "memory", PluginCategory::Sink))
            .connect("src", "left")
            .connect("src", "right");
        let plan = PipelinePlan::from_config(&config).unwrap();
        let stages = compiler().compile_task(&plan.map_task()).unwrap();
        let mut executor = TransformExecutor::new(stages, &plan);

        executor.run_source("src", json!(1)).unwrap();
        executor.run_source("src", json!(2)).unwrap();

        assert_eq!(executor.output().sink("left"), [json!(1), json!(2)]);
        assert_eq!(executor.output().sink("right"), [json!(1), json!(2)]);
    }

    #[test]
    fn test_errors_propagate_with_stage() {
        let config = PipelineConfig::new("failing")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("check", "fail", PluginCategory::Transform))
            .with_stage(StageDefinition::new("sink", "memory", PluginCategory::Sink))
            .connect("src", "check")
            .connect("check", "sink");
        let plan = PipelinePlan::from_config(&config).unwrap();
        let stages = compiler().compile_task(&plan.map_task()).unwrap();
        let mut executor = TransformExecutor::new(stages, &plan);

        executor.run_source("src", json!({"ok": true})).unwrap();
        let err = executor.run_source("src", json!({"fail": true})).unwrap_err();

        assert_eq!(err.stage_name(), Some("check"));
        assert!(matches!(err, EtlError::Transformation(_)));
        assert_eq!(executor.output().sink("sink").len(), 1);
    }

    #[test]
    fn test_entry_point_checks() {
        let plan = aggregation_plan();
        let stages = compiler().compile_task(&plan.map_task()).unwrap();
        let mut executor = TransformExecutor::new(stages, &plan);

        assert!(matches!(
            executor.run_source("nope", json!(1)),
            Err(EtlError::UnknownStage(_))
        ));
        assert!(matches!(
            executor.run_group(json!("A"), Vec::new()),
            Err(EtlError::Task(_))
        ));

        let stages = compiler().compile_task(&plan.reduce_task()).unwrap();
        let mut reduce = TransformExecutor::new(stages, &plan);
        assert!(matches!(
            reduce.run_boundary(json!(1)),
            Err(EtlError::RoleMismatch { entry: "transform", .. })
        ));
    }

    #[test]
    fn test_compute_boundary_halves() {
        let config = PipelineConfig::new("compute")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("score", "external", PluginCategory::Compute))
            .with_stage(StageDefinition::new("sink", "memory", PluginCategory::Sink))
            .connect("src", "score")
            .connect("score", "sink");
        let plan = PipelinePlan::from_config(&config).unwrap();

        let map_stages = compiler().compile_task(&plan.map_task()).unwrap();
        let mut map = TransformExecutor::new(map_stages, &plan);
        map.run_source("src", json!({"x": 1})).unwrap();
        assert_eq!(map.output().boundary, vec![json!({"x": 1})]);

        let reduce_stages = compiler().compile_task(&plan.reduce_task()).unwrap();
        let mut reduce = TransformExecutor::new(reduce_stages, &plan);
        reduce.run_boundary(json!({"x": 2})).unwrap();
        assert_eq!(reduce.output().sink("sink"), [json!({"x": 2})]);
        assert_eq!(reduce.stage("score").unwrap().role(), Some(StageRole::IdentityOut));
    }
}
