//! An in-process stand-in for the distributed dataflow engine.

use crate::compiler::TransformCompiler;
use crate::core::{PluginCategory, Record};
use crate::errors::{EtlError, StageOperation, TransformationError};
use crate::events::TASK_COMPLETED;
use crate::executor::{TaskOutput, TransformExecutor};
use crate::pipeline::{PipelinePlan, PipelineStage};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs a compute stage over its whole input, as the engine would.
pub type DatasetCompute =
    Arc<dyn Fn(&str, Vec<Record>) -> anyhow::Result<Vec<Record>> + Send + Sync>;

/// One input partition of a source stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// The source stage the records enter through.
    pub source: String,
    /// The records of the partition.
    pub records: Vec<Record>,
}

impl Partition {
    /// Creates a partition.
    #[must_use]
    pub fn new(source: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    /// Splits records into `count` contiguous partitions of one source.
    #[must_use]
    pub fn split(source: &str, records: Vec<Record>, count: usize) -> Vec<Self> {
        let size = records.len().div_ceil(count.max(1)).max(1);
        let mut records = records.into_iter().peekable();
        let mut partitions = Vec::new();
        while records.peek().is_some() {
            partitions.push(Self::new(source, records.by_ref().take(size).collect()));
        }
        partitions
    }
}

/// What a run of the whole pipeline produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// Records reaching each terminal stage, by stage name.
    pub sinks: BTreeMap<String, Vec<Record>>,
    /// Number of map tasks run.
    pub map_tasks: usize,
    /// Number of reduce tasks run.
    pub reduce_tasks: usize,
}

impl RunOutput {
    /// Returns the records that reached `stage`.
    #[must_use]
    pub fn sink(&self, stage: &str) -> &[Record] {
        self.sinks.get(stage).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Runs a planned pipeline in process.
///
/// Every map partition and every reduce partition gets its own compiled task
/// on tokio's blocking pool. Keyed pairs are grouped by the canonical JSON
/// text of their key.
#[derive(Clone)]
pub struct LocalEngine {
    plan: Arc<PipelinePlan>,
    compiler: TransformCompiler,
    reduce_partitions: usize,
    compute: DatasetCompute,
}

impl LocalEngine {
    /// Creates an engine. Compute stages pass their input through unchanged
    /// until [`Self::with_compute`] is set.
    #[must_use]
    pub fn new(plan: PipelinePlan, compiler: TransformCompiler) -> Self {
        Self {
            plan: Arc::new(plan),
            compiler,
            reduce_partitions: 2,
            compute: Arc::new(|_, records| Ok(records)),
        }
    }

    /// Sets how many reduce tasks share the groups.
    #[must_use]
    pub fn with_reduce_partitions(mut self, count: usize) -> Self {
        self.reduce_partitions = count.max(1);
        self
    }

    /// Sets the function that runs compute stages.
    #[must_use]
    pub fn with_compute<F>(mut self, compute: F) -> Self
    where
        F: Fn(&str, Vec<Record>) -> anyhow::Result<Vec<Record>> + Send + Sync + 'static,
    {
        self.compute = Arc::new(compute);
        self
    }

    /// Returns the plan.
    #[must_use]
    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Runs the pipeline over the given source partitions.
    ///
    /// # Errors
    ///
    /// Returns the first compilation or stage failure of any task, or
    /// `EtlError::Task` if a task panicked.
    pub async fn run(&self, partitions: Vec<Partition>) -> Result<RunOutput, EtlError> {
        info!(
            pipeline = %self.plan.name(),
            partitions = partitions.len(),
            "Starting local run"
        );
        let map_stages = Arc::new(self.plan.map_task());
        let map_tasks = partitions.len();
        let handles = partitions.into_iter().enumerate().map(|(i, partition)| {
            let engine = self.clone();
            let stages = Arc::clone(&map_stages);
            tokio::task::spawn_blocking(move || engine.run_map_task(i, &stages, partition))
        });
        let merged = merge(futures::future::try_join_all(handles).await)?;

        let mut output = RunOutput {
            sinks: merged.sinks,
            map_tasks,
            reduce_tasks: 0,
        };

        let Some(boundary) = self.plan.boundary() else {
            return Ok(output);
        };
        let boundary_name = boundary.name.clone();
        let reduce = match boundary.plugin.category {
            PluginCategory::Aggregator => {
                self.run_reduce_tasks(ReduceInput::Groups(group(merged.keyed)?))
                    .await?
            }
            PluginCategory::Compute => {
                let computed = self.run_compute(&boundary_name, merged.boundary)?;
                self.run_reduce_tasks(ReduceInput::Records(computed)).await?
            }
            PluginCategory::ComputeSink => {
                let written = self.run_compute(&boundary_name, merged.boundary)?;
                output.sinks.entry(boundary_name).or_default().extend(written);
                return Ok(output);
            }
            _ => return Ok(output),
        };

        output.reduce_tasks = reduce.1;
        for (stage, records) in reduce.0.sinks {
            output.sinks.entry(stage).or_default().extend(records);
        }
        Ok(output)
    }

    fn run_compute(&self, stage: &str, records: Vec<Record>) -> Result<Vec<Record>, EtlError> {
        debug!(stage = %stage, records = records.len(), "Running compute stage");
        (self.compute)(stage, records)
            .map_err(|e| TransformationError::new(stage, StageOperation::Transform, e).into())
    }

    async fn run_reduce_tasks(&self, input: ReduceInput) -> Result<(TaskOutput, usize), EtlError> {
        let reduce_stages = Arc::new(self.plan.reduce_task());
        let chunks = input.partition(self.reduce_partitions);
        let count = chunks.len();
        let handles = chunks.into_iter().enumerate().map(|(i, chunk)| {
            let engine = self.clone();
            let stages = Arc::clone(&reduce_stages);
            tokio::task::spawn_blocking(move || engine.run_reduce_task(i, &stages, chunk))
        });
        let merged = merge(futures::future::try_join_all(handles).await)?;
        Ok((merged, count))
    }

    fn run_map_task(
        &self,
        task: usize,
        stages: &[PipelineStage],
        partition: Partition,
    ) -> Result<TaskOutput, EtlError> {
        let compiled = self.compiler.compile_task(stages)?;
        let mut executor = TransformExecutor::new(compiled, &self.plan);
        let records = partition.records.len();
        for record in partition.records {
            executor.run_source(&partition.source, record)?;
        }
        self.completed(&format!("map-{task}"), records);
        Ok(executor.take_output())
    }

    fn run_reduce_task(
        &self,
        task: usize,
        stages: &[PipelineStage],
        input: ReduceInput,
    ) -> Result<TaskOutput, EtlError> {
        let compiled = self.compiler.compile_task(stages)?;
        let mut executor = TransformExecutor::new(compiled, &self.plan);
        let records = match input {
            ReduceInput::Groups(groups) => {
                let count = groups.len();
                for (key, values) in groups {
                    executor.run_group(key, values)?;
                }
                count
            }
            ReduceInput::Records(records) => {
                let count = records.len();
                for record in records {
                    executor.run_boundary(record)?;
                }
                count
            }
        };
        self.completed(&format!("reduce-{task}"), records);
        Ok(executor.take_output())
    }

    fn completed(&self, task: &str, inputs: usize) {
        debug!(task = %task, inputs, "Task completed");
        self.compiler
            .event_sink()
            .try_emit(TASK_COMPLETED, Some(json!({"task": task, "inputs": inputs})));
    }
}

impl fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEngine")
            .field("pipeline", &self.plan.name())
            .field("reduce_partitions", &self.reduce_partitions)
            .finish_non_exhaustive()
    }
}

/// The input of one reduce task.
enum ReduceInput {
    Groups(Vec<(Record, Vec<Record>)>),
    Records(Vec<Record>),
}

impl ReduceInput {
    /// Deals groups or records round-robin over at most `count` tasks.
    fn partition(self, count: usize) -> Vec<Self> {
        match self {
            Self::Groups(groups) => deal(groups, count).into_iter().map(Self::Groups).collect(),
            Self::Records(records) => deal(records, count).into_iter().map(Self::Records).collect(),
        }
    }
}

fn deal<T>(items: Vec<T>, count: usize) -> Vec<Vec<T>> {
    let mut chunks: Vec<Vec<T>> = (0..count.max(1)).map(|_| Vec::new()).collect();
    let len = chunks.len();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % len].push(item);
    }
    chunks.retain(|chunk| !chunk.is_empty());
    chunks
}

/// Groups keyed pairs by the canonical JSON text of the key.
fn group(pairs: Vec<(Record, Record)>) -> Result<Vec<(Record, Vec<Record>)>, EtlError> {
    let mut groups: BTreeMap<String, (Record, Vec<Record>)> = BTreeMap::new();
    for (key, value) in pairs {
        let canonical = serde_json::to_string(&key)?;
        groups
            .entry(canonical)
            .or_insert_with(|| (key, Vec::new()))
            .1
            .push(value);
    }
    Ok(groups.into_values().collect())
}

fn merge(
    joined: Result<Vec<Result<TaskOutput, EtlError>>, tokio::task::JoinError>,
) -> Result<TaskOutput, EtlError> {
    let mut merged = TaskOutput::default();
    for output in joined.map_err(|e| EtlError::Task(e.to_string()))? {
        merged.merge(output?);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, StageDefinition};
    use crate::events::CollectingEventSink;
    use crate::testing::{assert_records_unordered, category_records, sample_registry, sum_pipeline};

    fn engine(config: &PipelineConfig) -> LocalEngine {
        let plan = PipelinePlan::from_config(config).unwrap();
        LocalEngine::new(plan, TransformCompiler::new(Arc::new(sample_registry())))
    }

    #[test]
    fn test_partition_split() {
        let records = category_records(&[("A", 1), ("B", 2), ("C", 3)]);
        let partitions = Partition::split("src", records, 2);

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].records.len(), 2);
        assert_eq!(partitions[1].records.len(), 1);
        assert!(Partition::split("src", Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_group_by_canonical_key() {
        let pairs = vec![
            (json!({"a": 1, "b": 2}), json!(1)),
            (json!({"b": 2, "a": 1}), json!(2)),
            (json!("x"), json!(3)),
        ];
        let groups = group(pairs).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.contains(&(json!({"a": 1, "b": 2}), vec![json!(1), json!(2)])));
    }

    #[test]
    fn test_deal_round_robin() {
        assert_eq!(deal(vec![1, 2, 3], 2), vec![vec![1, 3], vec![2]]);
        assert_eq!(deal(vec![1], 4), vec![vec![1]]);
    }

    #[tokio::test]
    async fn test_sum_pipeline_across_partitions() {
        let events = Arc::new(CollectingEventSink::new());
        let plan = PipelinePlan::from_config(&sum_pipeline()).unwrap();
        let compiler =
            TransformCompiler::new(Arc::new(sample_registry())).with_event_sink(events.clone());
        let engine = LocalEngine::new(plan, compiler).with_reduce_partitions(3);

        let records = category_records(&[("A", 3), ("B", 5), ("A", 2), ("C", 1)]);
        let output = engine
            .run(Partition::split("source", records, 2))
            .await
            .unwrap();

        assert_records_unordered(
            output.sink("sink"),
            &[json!({"A": 5}), json!({"B": 5}), json!({"C": 1})],
        );
        assert_eq!(output.map_tasks, 2);
        assert_eq!(output.reduce_tasks, 3);
        assert_eq!(events.events_of_type(TASK_COMPLETED).len(), 5);
    }

    #[tokio::test]
    async fn test_compute_boundary_runs_compute() {
        let config = PipelineConfig::new("scored")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("score", "model", PluginCategory::Compute))
            .with_stage(StageDefinition::new("sink", "memory", PluginCategory::Sink))
            .connect("src", "score")
            .connect("score", "sink");
        let engine = engine(&config).with_compute(|stage, records| {
            Ok(records
                .into_iter()
                .map(|r| json!({"stage": stage, "x": r["x"]}))
                .collect())
        });

        let output = engine
            .run(vec![Partition::new("src", vec![json!({"x": 1}), json!({"x": 2})])])
            .await
            .unwrap();

        assert_records_unordered(
            output.sink("sink"),
            &[json!({"stage": "score", "x": 1}), json!({"stage": "score", "x": 2})],
        );
    }

    #[tokio::test]
    async fn test_compute_sink_collects_written_records() {
        let config = PipelineConfig::new("export")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("export", "writer", PluginCategory::ComputeSink))
            .connect("src", "export");

        let output = engine(&config)
            .run(vec![Partition::new("src", vec![json!(1), json!(2)])])
            .await
            .unwrap();

        assert_eq!(output.sink("export"), [json!(1), json!(2)]);
        assert_eq!(output.reduce_tasks, 0);
    }

    #[tokio::test]
    async fn test_compute_failure_names_stage() {
        let config = PipelineConfig::new("export")
            .with_stage(StageDefinition::new("src", "memory", PluginCategory::Source))
            .with_stage(StageDefinition::new("export", "writer", PluginCategory::ComputeSink))
            .connect("src", "export");
        let engine = engine(&config).with_compute(|_, _| anyhow::bail!("disk full"));

        let err = engine
            .run(vec![Partition::new("src", vec![json!(1)])])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Stage 'export' failed in transform: disk full");
    }
}
