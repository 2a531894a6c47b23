//! Pipeline validation and task planning.

use super::PipelineStage;
use crate::config::{PipelineConfig, StageDefinition};
use crate::core::{Phase, PluginCategory};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use std::collections::{HashMap, HashSet, VecDeque};

/// A validated pipeline, split into the stages of its map and reduce tasks.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    name: String,
    order: Vec<String>,
    stages: HashMap<String, StageDefinition>,
    successors: HashMap<String, Vec<String>>,
    predecessors: HashMap<String, Vec<String>>,
    boundary: Option<String>,
    after_break: HashSet<String>,
}

impl PipelinePlan {
    /// Validates a pipeline definition and plans its tasks.
    ///
    /// # Errors
    ///
    /// Returns a `PipelineValidationError` carrying a `PLAN-*` code if the
    /// definition is not a valid single-boundary DAG.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineValidationError> {
        if config.name.trim().is_empty() {
            return Err(invalid(
                "PLAN-001-NAME",
                "Pipeline has no name",
                "Pipeline name must not be empty".to_string(),
                Vec::new(),
                "Set the 'name' field of the pipeline definition.",
            ));
        }
        if config.stages.is_empty() {
            return Err(invalid(
                "PLAN-001-EMPTY",
                "Cannot plan an empty pipeline",
                format!("Pipeline '{}' has no stages", config.name),
                Vec::new(),
                "Add at least one stage to the pipeline.",
            ));
        }

        let mut stages = HashMap::with_capacity(config.stages.len());
        let mut definition_order = Vec::with_capacity(config.stages.len());
        for stage in &config.stages {
            if stages.insert(stage.name.clone(), stage.clone()).is_some() {
                return Err(invalid(
                    "PLAN-003-DUPLICATE",
                    "Duplicate stage name",
                    format!("Stage '{}' is defined more than once", stage.name),
                    vec![stage.name.clone()],
                    "Give every stage a unique name.",
                ));
            }
            definition_order.push(stage.name.clone());
        }

        let mut successors: HashMap<String, Vec<String>> = HashMap::new();
        let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
        for connection in &config.connections {
            for endpoint in [&connection.from, &connection.to] {
                if !stages.contains_key(endpoint) {
                    return Err(invalid(
                        "PLAN-004-UNKNOWN_STAGE",
                        "Connection references an unknown stage",
                        format!(
                            "Connection '{}' -> '{}' references undefined stage '{endpoint}'",
                            connection.from, connection.to
                        ),
                        vec![endpoint.clone()],
                        "Define the stage or remove the connection.",
                    ));
                }
            }
            if connection.from == connection.to {
                return Err(invalid(
                    "PLAN-005-SELF_LOOP",
                    "Stage connected to itself",
                    format!("Stage '{}' is connected to itself", connection.from),
                    vec![connection.from.clone()],
                    "Remove the self-referencing connection.",
                ));
            }
            let next = successors.entry(connection.from.clone()).or_default();
            if !next.contains(&connection.to) {
                next.push(connection.to.clone());
                predecessors
                    .entry(connection.to.clone())
                    .or_default()
                    .push(connection.from.clone());
            }
        }

        if let Some(cycle) = detect_cycle(&definition_order, &successors) {
            return Err(invalid(
                "PLAN-002-CYCLE",
                "Pipeline contains a cycle",
                format!("Cycle detected: {}", cycle.join(" -> ")),
                cycle,
                "Remove one of the connections forming the cycle.",
            ));
        }

        for name in &definition_order {
            let category = stages[name].plugin.category;
            if category.is_source() && predecessors.contains_key(name) {
                return Err(invalid(
                    "PLAN-006-SOURCE_INPUT",
                    "Source has an input",
                    format!("Source '{name}' cannot receive records from another stage"),
                    vec![name.clone()],
                    "Remove the connections into the source.",
                ));
            }
            if category.is_sink() && successors.contains_key(name) {
                return Err(invalid(
                    "PLAN-007-SINK_OUTPUT",
                    "Sink has an output",
                    format!("Sink '{name}' cannot send records to another stage"),
                    vec![name.clone()],
                    "Remove the connections out of the sink.",
                ));
            }
        }

        let boundaries: Vec<String> = definition_order
            .iter()
            .filter(|name| stages[*name].plugin.category.is_boundary())
            .cloned()
            .collect();
        if boundaries.len() > 1 {
            return Err(invalid(
                "PLAN-008-BOUNDARIES",
                "More than one grouping boundary",
                format!(
                    "Pipeline '{}' has {} grouping boundaries: {}",
                    config.name,
                    boundaries.len(),
                    boundaries.join(", ")
                ),
                boundaries,
                "Split the pipeline so each part has at most one aggregator or compute stage.",
            ));
        }
        let boundary = boundaries.into_iter().next();

        let after_break = boundary
            .as_deref()
            .map(|b| reachable_from(b, &successors))
            .unwrap_or_default();
        for name in &after_break {
            for upstream in predecessors.get(name).into_iter().flatten() {
                if Some(upstream) != boundary.as_ref() && !after_break.contains(upstream) {
                    return Err(invalid(
                        "PLAN-009-CROSSES_BREAK",
                        "Connection bypasses the grouping boundary",
                        format!(
                            "Stage '{name}' runs after the break but also receives records from '{upstream}' before it"
                        ),
                        vec![upstream.clone(), name.clone()],
                        "Route every input of a post-boundary stage through the boundary stage.",
                    ));
                }
            }
        }

        let order = topological_sort(&definition_order, &predecessors);
        tracing::debug!(
            pipeline = %config.name,
            stages = order.len(),
            boundary = ?boundary,
            "Planned pipeline"
        );

        Ok(Self {
            name: config.name.clone(),
            order,
            stages,
            successors,
            predecessors,
            boundary,
            after_break,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every stage name in topological order.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Looks up a stage definition.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.get(name)
    }

    /// Returns the grouping boundary stage, if any.
    #[must_use]
    pub fn boundary(&self) -> Option<&StageDefinition> {
        self.boundary.as_deref().and_then(|name| self.stages.get(name))
    }

    /// Returns true if the pipeline has a grouping boundary.
    #[must_use]
    pub const fn is_split(&self) -> bool {
        self.boundary.is_some()
    }

    /// Returns the stages `name` sends records to.
    #[must_use]
    pub fn successors(&self, name: &str) -> &[String] {
        self.successors.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the stages `name` receives records from.
    #[must_use]
    pub fn predecessors(&self, name: &str) -> &[String] {
        self.predecessors.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the source stage names in topological order.
    #[must_use]
    pub fn sources(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.stages[*name].plugin.category.is_source())
            .map(String::as_str)
            .collect()
    }

    /// Returns the stages of the map task in topological order.
    ///
    /// Without a boundary this is the whole pipeline, tagged `Unsplit`.
    /// Otherwise it is every stage not downstream of the boundary, the
    /// boundary included, tagged `BeforeBreak`.
    #[must_use]
    pub fn map_task(&self) -> Vec<PipelineStage> {
        let phase = if self.is_split() {
            Phase::BeforeBreak
        } else {
            Phase::Unsplit
        };
        self.order
            .iter()
            .filter(|name| !self.after_break.contains(*name))
            .map(|name| PipelineStage::from_definition(&self.stages[name], phase))
            .collect()
    }

    /// Returns the stages of the reduce task in topological order, tagged
    /// `AfterBreak`.
    ///
    /// Empty without a boundary. A compute sink ends the pipeline in the map
    /// task, so it has no reduce-side half.
    #[must_use]
    pub fn reduce_task(&self) -> Vec<PipelineStage> {
        let Some(boundary) = self.boundary() else {
            return Vec::new();
        };
        let mut stages = Vec::new();
        if boundary.plugin.category != PluginCategory::ComputeSink {
            stages.push(PipelineStage::from_definition(boundary, Phase::AfterBreak));
        }
        stages.extend(
            self.order
                .iter()
                .filter(|name| self.after_break.contains(*name))
                .map(|name| PipelineStage::from_definition(&self.stages[name], Phase::AfterBreak)),
        );
        stages
    }
}

fn invalid(
    code: &str,
    summary: &str,
    message: String,
    stages: Vec<String>,
    hint: &str,
) -> PipelineValidationError {
    let mut info = ContractErrorInfo::new(code, summary).with_fix_hint(hint);
    if !stages.is_empty() {
        info = info.with_context_entry("stages", stages.join(", "));
    }
    PipelineValidationError::new(message)
        .with_stages(stages)
        .with_error_info(info)
}

/// Returns the stages strictly downstream of `start`.
fn reachable_from(start: &str, successors: &HashMap<String, Vec<String>>) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in successors.get(node).into_iter().flatten() {
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// Finds a cycle, returned as the path that closes it.
fn detect_cycle(
    order: &[String],
    successors: &HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    fn dfs(
        node: &str,
        successors: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        on_path: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        on_path.insert(node.to_string());
        path.push(node.to_string());

        for next in successors.get(node).into_iter().flatten() {
            if !visited.contains(next) {
                if let Some(cycle) = dfs(next, successors, visited, on_path, path) {
                    return Some(cycle);
                }
            } else if on_path.contains(next) {
                if let Some(start) = path.iter().position(|n| n == next) {
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        on_path.remove(node);
        None
    }

    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    let mut path = Vec::new();
    for name in order {
        if !visited.contains(name) {
            if let Some(cycle) = dfs(name, successors, &mut visited, &mut on_path, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Orders stages so every stage follows its inputs, ties broken by
/// definition order. The graph must be acyclic.
fn topological_sort(order: &[String], predecessors: &HashMap<String, Vec<String>>) -> Vec<String> {
    fn visit(
        node: &str,
        predecessors: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(node.to_string()) {
            return;
        }
        for upstream in predecessors.get(node).into_iter().flatten() {
            visit(upstream, predecessors, visited, result);
        }
        result.push(node.to_string());
    }

    let mut result = Vec::with_capacity(order.len());
    let mut visited = HashSet::new();
    for name in order {
        visit(name, predecessors, &mut visited, &mut result);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage(name: &str, category: PluginCategory) -> StageDefinition {
        StageDefinition::new(name, name, category)
    }

    fn aggregation_pipeline() -> PipelineConfig {
        PipelineConfig::new("agg")
            .with_stage(stage("sink", PluginCategory::Sink))
            .with_stage(stage("agg", PluginCategory::Aggregator))
            .with_stage(stage("parse", PluginCategory::Transform))
            .with_stage(stage("src", PluginCategory::Source))
            .connect("src", "parse")
            .connect("parse", "agg")
            .connect("agg", "sink")
    }

    fn phases(stages: &[PipelineStage]) -> Vec<(&str, Phase)> {
        stages.iter().map(|s| (s.name.as_str(), s.phase)).collect()
    }

    fn code(config: &PipelineConfig) -> String {
        PipelinePlan::from_config(config)
            .unwrap_err()
            .code()
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_topological_order() {
        let plan = PipelinePlan::from_config(&aggregation_pipeline()).unwrap();
        assert_eq!(plan.order(), ["src", "parse", "agg", "sink"]);
        assert_eq!(plan.sources(), vec!["src"]);
        assert_eq!(plan.successors("parse"), ["agg"]);
        assert_eq!(plan.predecessors("parse"), ["src"]);
        assert!(plan.successors("sink").is_empty());
    }

    #[test]
    fn test_split_phases() {
        let plan = PipelinePlan::from_config(&aggregation_pipeline()).unwrap();
        assert!(plan.is_split());
        assert_eq!(plan.boundary().map(|b| b.name.as_str()), Some("agg"));

        assert_eq!(
            phases(&plan.map_task()),
            vec![
                ("src", Phase::BeforeBreak),
                ("parse", Phase::BeforeBreak),
                ("agg", Phase::BeforeBreak),
            ]
        );
        assert_eq!(
            phases(&plan.reduce_task()),
            vec![("agg", Phase::AfterBreak), ("sink", Phase::AfterBreak)]
        );
    }

    #[test]
    fn test_unsplit_phases() {
        let config = PipelineConfig::new("plain")
            .with_stage(stage("src", PluginCategory::Source))
            .with_stage(stage("sink", PluginCategory::Sink))
            .connect("src", "sink");
        let plan = PipelinePlan::from_config(&config).unwrap();

        assert!(!plan.is_split());
        assert_eq!(
            phases(&plan.map_task()),
            vec![("src", Phase::Unsplit), ("sink", Phase::Unsplit)]
        );
        assert!(plan.reduce_task().is_empty());
    }

    #[test]
    fn test_compute_sink_has_no_reduce_half() {
        let config = PipelineConfig::new("ml")
            .with_stage(stage("src", PluginCategory::Source))
            .with_stage(stage("train", PluginCategory::ComputeSink))
            .connect("src", "train");
        let plan = PipelinePlan::from_config(&config).unwrap();

        assert_eq!(
            phases(&plan.map_task()),
            vec![("src", Phase::BeforeBreak), ("train", Phase::BeforeBreak)]
        );
        assert!(plan.reduce_task().is_empty());
    }

    #[test]
    fn test_parallel_branch_stays_in_map_task() {
        let config = aggregation_pipeline()
            .with_stage(stage("audit", PluginCategory::Sink))
            .connect("src", "audit");
        let plan = PipelinePlan::from_config(&config).unwrap();

        let map: Vec<String> = plan.map_task().into_iter().map(|s| s.name).collect();
        assert!(map.contains(&"audit".to_string()));
        assert_eq!(plan.reduce_task().len(), 2);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(code(&PipelineConfig::new("")), "PLAN-001-NAME");
        assert_eq!(code(&PipelineConfig::new("p")), "PLAN-001-EMPTY");
    }

    #[test]
    fn test_rejects_duplicate_stage() {
        let config = PipelineConfig::new("p")
            .with_stage(stage("a", PluginCategory::Source))
            .with_stage(stage("a", PluginCategory::Sink));
        assert_eq!(code(&config), "PLAN-003-DUPLICATE");
    }

    #[test]
    fn test_rejects_unknown_endpoint_and_self_loop() {
        let base = PipelineConfig::new("p").with_stage(stage("t", PluginCategory::Transform));
        assert_eq!(code(&base.clone().connect("t", "missing")), "PLAN-004-UNKNOWN_STAGE");
        assert_eq!(code(&base.connect("t", "t")), "PLAN-005-SELF_LOOP");
    }

    #[test]
    fn test_rejects_cycle() {
        let config = PipelineConfig::new("p")
            .with_stage(stage("a", PluginCategory::Transform))
            .with_stage(stage("b", PluginCategory::Transform))
            .with_stage(stage("c", PluginCategory::Transform))
            .connect("a", "b")
            .connect("b", "c")
            .connect("c", "a");
        let err = PipelinePlan::from_config(&config).unwrap_err();

        assert_eq!(err.code(), Some("PLAN-002-CYCLE"));
        assert_eq!(err.stages, vec!["a", "b", "c", "a"]);
        let context = &err.error_info.as_ref().unwrap().context;
        assert_eq!(context.get("stages").map(String::as_str), Some("a, b, c, a"));
    }

    #[test]
    fn test_rejects_source_input_and_sink_output() {
        let config = PipelineConfig::new("p")
            .with_stage(stage("t", PluginCategory::Transform))
            .with_stage(stage("src", PluginCategory::Source))
            .connect("t", "src");
        assert_eq!(code(&config), "PLAN-006-SOURCE_INPUT");

        let config = PipelineConfig::new("p")
            .with_stage(stage("sink", PluginCategory::Sink))
            .with_stage(stage("t", PluginCategory::Transform))
            .connect("sink", "t");
        assert_eq!(code(&config), "PLAN-007-SINK_OUTPUT");
    }

    #[test]
    fn test_rejects_two_boundaries() {
        let config = PipelineConfig::new("p")
            .with_stage(stage("src", PluginCategory::Source))
            .with_stage(stage("agg", PluginCategory::Aggregator))
            .with_stage(stage("compute", PluginCategory::Compute))
            .connect("src", "agg")
            .connect("agg", "compute");
        let err = PipelinePlan::from_config(&config).unwrap_err();

        assert_eq!(err.code(), Some("PLAN-008-BOUNDARIES"));
        assert_eq!(err.stages, vec!["agg", "compute"]);
    }

    #[test]
    fn test_rejects_connection_around_boundary() {
        let config = aggregation_pipeline().connect("parse", "sink");
        assert_eq!(code(&config), "PLAN-009-CROSSES_BREAK");
    }

    #[test]
    fn test_duplicate_connections_collapse() {
        let config = aggregation_pipeline().connect("src", "parse");
        let plan = PipelinePlan::from_config(&config).unwrap();
        assert_eq!(plan.successors("src"), ["parse"]);
    }
}
