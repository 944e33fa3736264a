//! Mutable execution state (§3 `HensuState`, C1).
//!
//! `HensuState` is owned exclusively by the Workflow Loop of one execution.
//! The single exception is `context`, which Parallel branches and Fork
//! targets write into concurrently — it is backed by `DashMap` (sharded,
//! lock-free reads/writes) rather than a `Mutex<HashMap<_>>`, matching the
//! last-writer-wins semantics §5 requires.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::model::plan::{Plan, PlannedStep, StepResult, StepStatus};

/// Outcome of a single node execution (§3 `NodeResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Success,
    Failure,
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub status: NodeStatus,
    #[serde(default)]
    pub output: Option<Json>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, Json>,
}

impl NodeResult {
    pub fn success(output: impl Into<Json>) -> Self {
        NodeResult {
            status: NodeStatus::Success,
            output: Some(output.into()),
            metadata: Default::default(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("error".to_string(), Json::String(message.into()));
        NodeResult {
            status: NodeStatus::Failure,
            output: None,
            metadata,
        }
    }

    pub fn pending(metadata: std::collections::HashMap<String, Json>) -> Self {
        NodeResult {
            status: NodeStatus::Pending,
            output: None,
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }
}

/// An immutable record appended to `HensuState::history` (§3 `ExecutionStep`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub node_id: String,
    pub state_snapshot: HensuSnapshot,
    pub node_result: NodeResult,
    pub timestamp: DateTime<Utc>,
}

/// Why a backtrack happened (§4.3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BacktrackType {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktrackEvent {
    pub backtrack_type: BacktrackType,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub rubric_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Last rubric evaluation recorded on the state (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricEvaluation {
    pub rubric_id: String,
    pub score: f64,
    pub passed: bool,
}

/// Why a checkpoint was written — drives the lease rules of §4.16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    Checkpoint,
    Completed,
    Paused,
    Cancelled,
}

/// Persistable projection of a `PlannedStep` (§3 `PlanSnapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStepSnapshot {
    pub index: usize,
    pub description: String,
    pub status: StepStatus,
}

impl From<&PlannedStep> for PlannedStepSnapshot {
    fn from(step: &PlannedStep) -> Self {
        PlannedStepSnapshot {
            index: step.index,
            description: step.description.clone(),
            status: step.status,
        }
    }
}

/// Persistable projection of an in-flight `Plan` (§3 `PlanSnapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub node_id: String,
    pub steps: Vec<PlannedStepSnapshot>,
    pub current_step_index: usize,
    pub completed_step_results: Vec<StepResult>,
}

impl PlanSnapshot {
    pub fn is_complete(&self) -> bool {
        self.current_step_index >= self.steps.len()
    }

    pub fn from_plan(plan: &Plan, current_step_index: usize, completed: Vec<StepResult>) -> Self {
        PlanSnapshot {
            node_id: plan.node_id.clone(),
            steps: plan.steps.iter().map(PlannedStepSnapshot::from).collect(),
            current_step_index,
            completed_step_results: completed,
        }
    }
}

/// Persistable projection of `HensuState` (§3 `HensuSnapshot`).
///
/// Invariant: `current_node_id.is_none()` iff this snapshot marks a
/// completed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HensuSnapshot {
    pub workflow_id: String,
    pub execution_id: String,
    pub current_node_id: Option<String>,
    pub context: std::collections::HashMap<String, Json>,
    pub history: Vec<ExecutionStep>,
    #[serde(default)]
    pub plan_snapshot: Option<PlanSnapshot>,
    pub created_at: DateTime<Utc>,
    pub checkpoint_reason: CheckpointReason,
}

/// Mutable execution state owned by one Workflow Loop invocation
/// (§3 `HensuState`).
#[derive(Debug, Clone)]
pub struct HensuState {
    pub execution_id: String,
    pub workflow_id: String,
    /// `None` means the execution is terminal.
    pub current_node_id: Option<String>,
    /// Concurrent-safe: mutated from Parallel branches and Fork targets
    /// without synchronizing through the Workflow Loop.
    pub context: Arc<DashMap<String, Json>>,
    pub history: Vec<ExecutionStep>,
    pub rubric_evaluation: Option<RubricEvaluation>,
    pub loop_break_target: Option<String>,
    pub backtrack_log: Vec<BacktrackEvent>,
}

impl HensuState {
    pub fn new(execution_id: impl Into<String>, workflow_id: impl Into<String>, start_node_id: impl Into<String>) -> Self {
        HensuState {
            execution_id: execution_id.into(),
            workflow_id: workflow_id.into(),
            current_node_id: Some(start_node_id.into()),
            context: Arc::new(DashMap::new()),
            history: Vec::new(),
            rubric_evaluation: None,
            loop_break_target: None,
            backtrack_log: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current_node_id.is_none()
    }

    /// Extracts a consistent-snapshot projection suitable for
    /// checkpointing (§3, §4.1 step 3).
    pub fn snapshot(&self, reason: CheckpointReason, plan_snapshot: Option<PlanSnapshot>) -> HensuSnapshot {
        let context = self
            .context
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        HensuSnapshot {
            workflow_id: self.workflow_id.clone(),
            execution_id: self.execution_id.clone(),
            current_node_id: self.current_node_id.clone(),
            context,
            history: self.history.clone(),
            plan_snapshot,
            created_at: Utc::now(),
            checkpoint_reason: reason,
        }
    }

    /// Rehydrates state from a persisted snapshot, e.g. on resumption
    /// after a PENDING review gate (§5 Suspension points).
    pub fn from_snapshot(snapshot: &HensuSnapshot) -> Self {
        let context = DashMap::new();
        for (k, v) in &snapshot.context {
            context.insert(k.clone(), v.clone());
        }
        HensuState {
            execution_id: snapshot.execution_id.clone(),
            workflow_id: snapshot.workflow_id.clone(),
            current_node_id: snapshot.current_node_id.clone(),
            context: Arc::new(context),
            history: snapshot.history.clone(),
            rubric_evaluation: None,
            loop_break_target: None,
            backtrack_log: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrip_preserves_core_fields() {
        let state = HensuState::new("exec-1", "wf-1", "A");
        state.context.insert("name".to_string(), Json::String("Ada".to_string()));
        let snapshot = state.snapshot(CheckpointReason::Checkpoint, None);
        let restored = HensuState::from_snapshot(&snapshot);

        assert_eq!(restored.execution_id, state.execution_id);
        assert_eq!(restored.workflow_id, state.workflow_id);
        assert_eq!(restored.current_node_id, state.current_node_id);
        assert_eq!(restored.history.len(), state.history.len());
        assert_eq!(
            restored.context.get("name").map(|v| v.value().clone()),
            Some(Json::String("Ada".to_string()))
        );
    }

    #[test]
    fn terminal_iff_current_node_none() {
        let mut state = HensuState::new("exec-1", "wf-1", "A");
        assert!(!state.is_terminal());
        state.current_node_id = None;
        assert!(state.is_terminal());
        let snapshot = state.snapshot(CheckpointReason::Completed, None);
        assert!(snapshot.current_node_id.is_none());
    }
}
