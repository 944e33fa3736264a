//! The workflow graph (§3): `Workflow`, `Node`, and transition rules.
//!
//! `Workflow` is immutable and validated once at construction. Nothing in
//! the kernel mutates a `Workflow` after `Workflow::new` returns `Ok`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Declarative configuration for a Standard node's agent, kept opaque to
/// the kernel — the agent backend (§6 `AgentRegistry`) interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Human review configuration attached to a node (§4.3, §10 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewMode {
    #[default]
    Disabled,
    Optional,
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReviewConfig {
    #[serde(default)]
    pub mode: ReviewMode,
    #[serde(default)]
    pub allow_backtrack: bool,
    #[serde(default)]
    pub allow_state_edit: bool,
}

/// Plan constraints (§3 `Plan`, §6 options table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConstraints {
    pub max_steps: usize,
    #[serde(default)]
    pub max_replans: usize,
    /// Wall-clock cap in milliseconds, checked between steps.
    pub max_duration_ms: u64,
    #[serde(default)]
    pub max_token_budget: Option<u64>,
    #[serde(default = "default_true")]
    pub allow_replan: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlanningConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub review: bool,
    pub constraints: Option<PlanConstraints>,
}

/// One action dispatched by an Action node or a plan tool-call step (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Send {
        handler_id: String,
        payload: serde_json::Value,
    },
    Execute {
        command_id: String,
    },
    HttpCall {
        endpoint: String,
        method: String,
    },
    Notify {
        channel: String,
        message: String,
    },
}

/// Merge strategy for a Join node (§3 `Join`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    CollectAll,
    FirstCompleted,
    Concatenate,
    MergeMaps,
    Custom { merger_name: String },
}

/// A branch of a Parallel node (§3 `Parallel`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub agent_id: String,
    pub prompt: String,
    #[serde(default)]
    pub rubric_id: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusConfig {
    MajorityVote,
    Unanimous,
    WeightedVote { threshold: f64 },
    JudgeDecides { judge_agent_id: String },
}

/// Per-fork-target override of executor behavior, opaque to the kernel
/// beyond what the Fork executor needs (timeout, retries) — kept as a
/// free-form map so new knobs don't require a kernel change.
pub type TargetConfig = HashMap<String, serde_json::Value>;

/// Exit status carried by an End node (§3 `End`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitStatus {
    Success,
    Failure,
    Cancelled,
    Pending,
}

/// A single condition in a Loop's break-rule list (§4.14).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopConditionKind {
    Always,
    Expression(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakRule {
    pub condition: LoopConditionKind,
    pub target: String,
}

/// Tagged variant over the kinds of node a workflow graph can contain
/// (§3 `Node`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    Standard {
        prompt: String,
        agent_id: String,
        #[serde(default)]
        output_params: Vec<String>,
        #[serde(default)]
        rubric_id: Option<String>,
        #[serde(default)]
        review_config: ReviewConfig,
        #[serde(default)]
        planning_config: PlanningConfig,
        #[serde(default)]
        plan_failure_target: Option<String>,
    },
    Action {
        actions: Vec<Action>,
    },
    Loop {
        body_node: String,
        max_iterations: u32,
        condition: LoopConditionKind,
        #[serde(default)]
        break_rules: Vec<BreakRule>,
    },
    Parallel {
        branches: Vec<Branch>,
        #[serde(default)]
        consensus: Option<ConsensusConfig>,
    },
    Fork {
        targets: Vec<String>,
        #[serde(default)]
        target_configs: HashMap<String, TargetConfig>,
        #[serde(default)]
        wait_for_all: bool,
    },
    Join {
        await_targets: Vec<String>,
        merge_strategy: MergeStrategy,
        output_field: String,
        #[serde(default)]
        timeout_ms: u64,
        #[serde(default)]
        fail_on_any_error: bool,
    },
    SubWorkflow {
        child_workflow_id: String,
        #[serde(default)]
        input_mapping: HashMap<String, String>,
        #[serde(default)]
        output_mapping: HashMap<String, String>,
    },
    End {
        status: ExitStatus,
    },
    Generic {
        executor_type: String,
        #[serde(default)]
        config: serde_json::Value,
    },
}

/// A transition rule attached to a node (§3 `TransitionRule`).
///
/// `RubricFailTransition` carries no predicate here: the rubric
/// post-processor (§4.4) evaluates pass/fail itself and only consults this
/// rule's `target` once it has decided the node failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransitionRule {
    Success { target: String },
    Failure { target: String },
    /// `predicate` is a context-key expression understood by the same
    /// minimal evaluator the Loop executor uses (§4.14).
    Conditional { predicate: String, target: String },
    RubricFail { target: String },
}

impl TransitionRule {
    pub fn target(&self) -> &str {
        match self {
            TransitionRule::Success { target }
            | TransitionRule::Failure { target }
            | TransitionRule::Conditional { target, .. }
            | TransitionRule::RubricFail { target } => target,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub transition_rules: Vec<TransitionRule>,
}

/// Immutable directed graph of nodes plus agents, rubrics, and config
/// (§3 `Workflow`). Validated once at construction; never mutated
/// afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub version: String,
    pub nodes: HashMap<String, Node>,
    pub start_node_id: String,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    #[serde(default)]
    pub rubrics: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl Workflow {
    /// Constructs and validates a workflow graph, enforcing the
    /// invariants from §3: the start node exists, every rubric reference
    /// resolves, and every transition target names a real node.
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        nodes: HashMap<String, Node>,
        start_node_id: impl Into<String>,
        agents: HashMap<String, AgentConfig>,
        rubrics: HashMap<String, serde_json::Value>,
    ) -> Result<Self, WorkflowError> {
        let workflow = Workflow {
            id: id.into(),
            version: version.into(),
            nodes,
            start_node_id: start_node_id.into(),
            agents,
            rubrics,
            metadata: None,
            config: None,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        if !self.nodes.contains_key(&self.start_node_id) {
            return Err(WorkflowError::UnknownStartNode(self.start_node_id.clone()));
        }

        for node in self.nodes.values() {
            for rule in &node.transition_rules {
                let target = rule.target();
                if !self.nodes.contains_key(target) {
                    return Err(WorkflowError::UnknownNodeReference(
                        node.id.clone(),
                        target.to_string(),
                    ));
                }
            }

            match &node.kind {
                NodeKind::Standard { rubric_id, .. } => {
                    if let Some(rubric_id) = rubric_id {
                        if !self.rubrics.contains_key(rubric_id) {
                            return Err(WorkflowError::UnknownRubricReference(
                                node.id.clone(),
                                rubric_id.clone(),
                            ));
                        }
                    }
                }
                NodeKind::Loop { body_node, .. } => {
                    if !self.nodes.contains_key(body_node) {
                        return Err(WorkflowError::UnknownNodeReference(
                            node.id.clone(),
                            body_node.clone(),
                        ));
                    }
                }
                NodeKind::Fork { targets, .. } => {
                    for target in targets {
                        if !self.nodes.contains_key(target) {
                            return Err(WorkflowError::UnknownNodeReference(
                                node.id.clone(),
                                target.clone(),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}
