//! The transformation compiler.

use super::{classify, Classification};
use crate::config::ResolvedConfiguration;
use crate::context::{RuntimeArguments, StageContext, WorkflowToken};
use crate::core::StageRole;
use crate::errors::{EtlError, StageInitializationError, UnresolvedMacroError};
use crate::events::{EventSink, NoOpEventSink, STAGE_COMPILED, STAGE_FAILED, TASK_COMPILED};
use crate::macros::resolve;
use crate::metrics::{MetricsCollector, NoOpMetrics, StageMetrics};
use crate::observability::SpanTimer;
use crate::pipeline::PipelineStage;
use crate::plugin::{PluginInstance, PluginInstantiator, RecordAggregator, Transform};
use crate::transform::{
    CompiledStage, CompiledTransform, IdentityTransform, PluginTransform, PostGroupTransform,
    PreGroupTransform, TrackedTransform,
};
use chrono::Utc;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compiles planned stages for one run.
///
/// Holds the run state macros resolve against and the collaborators every
/// compiled stage shares. Cloning is cheap, so one compiler can be handed to
/// every task of a run.
#[derive(Clone)]
pub struct TransformCompiler {
    instantiator: Arc<dyn PluginInstantiator>,
    metrics: Arc<dyn MetricsCollector>,
    arguments: Arc<RuntimeArguments>,
    token: Arc<WorkflowToken>,
    logical_start_time: i64,
    events: Arc<dyn EventSink>,
}

impl TransformCompiler {
    /// Creates a compiler with empty run state, starting now.
    #[must_use]
    pub fn new(instantiator: Arc<dyn PluginInstantiator>) -> Self {
        Self {
            instantiator,
            metrics: Arc::new(NoOpMetrics),
            arguments: Arc::new(RuntimeArguments::default()),
            token: Arc::new(WorkflowToken::new()),
            logical_start_time: Utc::now().timestamp_millis(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the metrics collector compiled stages report to.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the runtime arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: RuntimeArguments) -> Self {
        self.arguments = Arc::new(arguments);
        self
    }

    /// Sets the workflow token.
    #[must_use]
    pub fn with_token(mut self, token: WorkflowToken) -> Self {
        self.token = Arc::new(token);
        self
    }

    /// Sets the logical start time in epoch milliseconds.
    #[must_use]
    pub const fn with_logical_start_time(mut self, millis: i64) -> Self {
        self.logical_start_time = millis;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the runtime arguments.
    #[must_use]
    pub fn arguments(&self) -> &RuntimeArguments {
        &self.arguments
    }

    /// Returns the logical start time in epoch milliseconds.
    #[must_use]
    pub const fn logical_start_time(&self) -> i64 {
        self.logical_start_time
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Returns the metrics collector.
    #[must_use]
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// Resolves a stage's raw configuration.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedMacroError` naming the stage and property.
    pub fn resolve(&self, stage: &PipelineStage) -> Result<ResolvedConfiguration, UnresolvedMacroError> {
        resolve(&stage.config, &self.arguments, &self.token, self.logical_start_time)
            .map_err(|err| err.with_stage(&stage.name))
    }

    /// Compiles a single stage.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::UnresolvedMacro` before anything is instantiated if
    /// the configuration does not resolve, `EtlError::Validation` if the
    /// category cannot run in the stage's phase, and
    /// `EtlError::StageInitialization` if the plugin cannot be created or
    /// initialized.
    pub fn compile_stage(&self, stage: &PipelineStage) -> Result<CompiledStage, EtlError> {
        let config = self.resolve(stage).map_err(|err| self.failed(stage, err.into()))?;
        self.build(stage, config)
    }

    /// Compiles every stage of one physical task.
    ///
    /// All configurations are resolved before the first plugin is
    /// instantiated.
    ///
    /// # Errors
    ///
    /// Returns the first failure, as for [`Self::compile_stage`].
    pub fn compile_task(&self, stages: &[PipelineStage]) -> Result<Vec<CompiledStage>, EtlError> {
        let timer = SpanTimer::start("compile_task");

        let mut resolved = Vec::with_capacity(stages.len());
        for stage in stages {
            let config = self.resolve(stage).map_err(|err| self.failed(stage, err.into()))?;
            resolved.push((stage, config));
        }

        let compiled = resolved
            .into_iter()
            .map(|(stage, config)| self.build(stage, config))
            .collect::<Result<Vec<_>, _>>()?;

        let duration_ms = timer.finish();
        info!(stages = compiled.len(), duration_ms, "Compiled task");
        self.events.try_emit(
            TASK_COMPILED,
            Some(json!({
                "stages": compiled.iter().map(CompiledStage::name).collect::<Vec<_>>(),
                "duration_ms": duration_ms,
            })),
        );
        Ok(compiled)
    }

    fn build(
        &self,
        stage: &PipelineStage,
        config: ResolvedConfiguration,
    ) -> Result<CompiledStage, EtlError> {
        let timer = SpanTimer::start(stage.name.clone());
        let result = self.build_transform(stage, config);
        let transform = result.map_err(|err| self.failed(stage, err))?;

        let duration_ms = timer.finish();
        debug!(
            stage = %stage.name,
            role = %transform,
            phase = %stage.phase,
            duration_ms,
            "Compiled stage"
        );
        self.events.try_emit(
            STAGE_COMPILED,
            Some(json!({
                "stage": stage.name,
                "role": transform.to_string(),
                "phase": stage.phase,
                "duration_ms": duration_ms,
            })),
        );
        Ok(CompiledStage::new(stage.clone(), transform))
    }

    fn build_transform(
        &self,
        stage: &PipelineStage,
        config: ResolvedConfiguration,
    ) -> Result<CompiledTransform, EtlError> {
        let classification = classify(stage.category, stage.phase)
            .map_err(|err| err.with_stages(vec![stage.name.clone()]))?;
        let mode = classification.tracking_mode(stage.category);
        let metrics = StageMetrics::new(&stage.name, Arc::clone(&self.metrics));

        let transform = match classification {
            Classification::Role(StageRole::PreGroup) => {
                let ctx = self.context(stage, config, &metrics);
                let mut pre = PreGroupTransform::new(self.aggregator(stage, ctx.config())?);
                pre.initialize(&ctx)
                    .map_err(|e| StageInitializationError::new(&stage.name, e))?;
                CompiledTransform::PreGroup(TrackedTransform::new(pre, mode, metrics))
            }
            Classification::Role(StageRole::PostGroup) => {
                let ctx = self.context(stage, config, &metrics);
                let mut post = PostGroupTransform::new(self.aggregator(stage, ctx.config())?);
                post.initialize(&ctx)
                    .map_err(|e| StageInitializationError::new(&stage.name, e))?;
                CompiledTransform::PostGroup(TrackedTransform::new(post, mode, metrics))
            }
            Classification::Role(role) => {
                CompiledTransform::Identity(role, TrackedTransform::new(IdentityTransform, mode, metrics))
            }
            Classification::General => {
                let ctx = self.context(stage, config, &metrics);
                let mut plugin = PluginTransform::new(self.transform(stage, ctx.config())?);
                plugin
                    .initialize(&ctx)
                    .map_err(|e| StageInitializationError::new(&stage.name, e))?;
                CompiledTransform::General(TrackedTransform::new(plugin, mode, metrics))
            }
        };
        Ok(transform)
    }

    fn context(
        &self,
        stage: &PipelineStage,
        config: ResolvedConfiguration,
        metrics: &StageMetrics,
    ) -> StageContext {
        StageContext::build(
            &stage.name,
            config,
            metrics.clone(),
            self.logical_start_time,
            Arc::clone(&self.arguments),
        )
    }

    fn instantiate(
        &self,
        stage: &PipelineStage,
        config: &ResolvedConfiguration,
    ) -> Result<PluginInstance, StageInitializationError> {
        self.instantiator
            .instantiate(stage, config)
            .map_err(|e| StageInitializationError::new(&stage.name, e))
    }

    fn aggregator(
        &self,
        stage: &PipelineStage,
        config: &ResolvedConfiguration,
    ) -> Result<Box<RecordAggregator>, StageInitializationError> {
        match self.instantiate(stage, config)? {
            PluginInstance::Aggregator(aggregator) => Ok(aggregator),
            other => Err(kind_mismatch(stage, &other)),
        }
    }

    fn transform(
        &self,
        stage: &PipelineStage,
        config: &ResolvedConfiguration,
    ) -> Result<Box<dyn Transform>, StageInitializationError> {
        match self.instantiate(stage, config)? {
            PluginInstance::Transform(transform) => Ok(transform),
            other => Err(kind_mismatch(stage, &other)),
        }
    }

    fn failed(&self, stage: &PipelineStage, err: EtlError) -> EtlError {
        warn!(stage = %stage.name, phase = %stage.phase, error = %err, "Stage compilation failed");
        self.events.try_emit(
            STAGE_FAILED,
            Some(json!({
                "stage": stage.name,
                "phase": stage.phase,
                "error": err.to_string(),
            })),
        );
        err
    }
}

fn kind_mismatch(stage: &PipelineStage, instance: &PluginInstance) -> StageInitializationError {
    StageInitializationError::new(
        &stage.name,
        anyhow::anyhow!(
            "plugin '{}' of type {} produced a {} instance",
            stage.plugin_name,
            stage.category,
            instance.kind()
        ),
    )
}

impl fmt::Debug for TransformCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformCompiler")
            .field("arguments", &self.arguments)
            .field("token", &self.token)
            .field("logical_start_time", &self.logical_start_time)
            .finish_non_exhaustive()
    }
}
