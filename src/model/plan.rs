//! Planning data model (§3 `Plan`, `PlannedStep`, `StepResult`, `PlanResult`).

use serde::{Deserialize, Serialize};

pub use crate::model::workflow::PlanConstraints;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanSource {
    Static,
    LlmGenerated,
}

/// One step's action (§3 `PlannedStep`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlanStepAction {
    ToolCall {
        tool_name: String,
        arguments: serde_json::Value,
    },
    Synthesize {
        #[serde(default)]
        agent_id: Option<String>,
        prompt: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    pub index: usize,
    pub action: PlanStepAction,
    pub description: String,
    pub status: StepStatus,
}

/// An ordered, LLM-or-statically-generated sequence of steps (§3 `Plan`).
///
/// Invariant: `steps[i].index == i` for all `i`, enforced by
/// `Plan::new`/`Plan::truncate_to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub node_id: String,
    pub source: PlanSource,
    pub steps: Vec<PlannedStep>,
    pub constraints: PlanConstraints,
}

impl Plan {
    pub fn new(
        id: impl Into<String>,
        node_id: impl Into<String>,
        source: PlanSource,
        mut steps: Vec<PlannedStep>,
        constraints: PlanConstraints,
    ) -> Self {
        for (i, step) in steps.iter_mut().enumerate() {
            step.index = i;
        }
        let max_steps = constraints.max_steps;
        let mut plan = Plan {
            id: id.into(),
            node_id: node_id.into(),
            source,
            steps,
            constraints,
        };
        plan.truncate_to(max_steps);
        plan
    }

    /// Truncates `steps` to at most `max_steps`, re-indexing so the
    /// contiguous-index invariant holds.
    pub fn truncate_to(&mut self, max_steps: usize) {
        self.steps.truncate(max_steps);
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.index = i;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub tool_name: String,
    pub success: bool,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Completed,
    Failed,
    Cancelled,
    Timeout,
    InProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub status: PlanStatus,
    pub step_results: Vec<StepResult>,
    /// -1 if no step failed.
    pub failed_at_step: i64,
    pub total_duration_ms: u64,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PlanResult {
    pub fn success(&self) -> bool {
        self.status == PlanStatus::Completed
    }
}
