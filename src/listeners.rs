//! Lifecycle observers (C11, §4.1, §4.9, §4.10, §5).
//!
//! Observer callbacks are delivered in event order; a failing observer
//! must never affect other observers or the execution (§5). Implementors
//! that can fail should catch internally and log — the dispatch helpers
//! below do not give observers a way to short-circuit.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::plan::{Plan, StepResult};
use crate::state::HensuState;

#[derive(Debug, Clone)]
pub enum PlanEvent {
    PlanCreated { plan_id: String },
    StepStarted { step_index: usize },
    StepCompleted { step_index: usize, success: bool },
    PlanRevised { old_plan_id: String, new_plan_id: String },
    PlanCompleted { success: bool, reason: Option<String> },
}

/// Fan-out target for execution lifecycle events. The kernel never
/// assumes a single listener — callers register as many as they like via
/// `ListenerRegistry`.
#[async_trait]
pub trait WorkflowListener: Send + Sync {
    async fn on_node_start(&self, _state: &HensuState, _node_id: &str) {}
    async fn on_node_complete(&self, _state: &HensuState, _node_id: &str) {}
    async fn on_agent_start(&self, _agent_id: &str, _prompt: &str) {}
    async fn on_agent_complete(&self, _agent_id: &str) {}
    async fn on_plan_event(&self, _event: &PlanEvent) {}
    async fn on_checkpoint(&self, _state: &HensuState) {}
}

/// A copy-on-read subscriber list (§9 design note): iteration snapshots
/// the `Arc` list so concurrent registration never corrupts in-flight
/// dispatch, and a panicking/erroring listener is simply skipped — it
/// cannot poison the list for the remaining subscribers.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn WorkflowListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn WorkflowListener>) {
        self.listeners.write().push(listener);
    }

    fn snapshot(&self) -> Vec<Arc<dyn WorkflowListener>> {
        self.listeners.read().clone()
    }

    pub async fn fire_node_start(&self, state: &HensuState, node_id: &str) {
        for listener in self.snapshot() {
            listener.on_node_start(state, node_id).await;
        }
    }

    pub async fn fire_node_complete(&self, state: &HensuState, node_id: &str) {
        for listener in self.snapshot() {
            listener.on_node_complete(state, node_id).await;
        }
    }

    pub async fn fire_agent_start(&self, agent_id: &str, prompt: &str) {
        for listener in self.snapshot() {
            listener.on_agent_start(agent_id, prompt).await;
        }
    }

    pub async fn fire_agent_complete(&self, agent_id: &str) {
        for listener in self.snapshot() {
            listener.on_agent_complete(agent_id).await;
        }
    }

    pub async fn fire_plan_event(&self, event: PlanEvent) {
        for listener in self.snapshot() {
            listener.on_plan_event(&event).await;
        }
    }

    pub async fn fire_checkpoint(&self, state: &HensuState) {
        tracing::debug!(execution_id = %state.execution_id, node_id = ?state.current_node_id, "checkpoint");
        for listener in self.snapshot() {
            listener.on_checkpoint(state).await;
        }
    }
}

/// Emitted once per plan pass by `PlanExecutor` (§4.10); `PlanCompleted`
/// is deliberately absent here — only `PlanExecutionProcessor` emits it
/// (§4.9, §4.10), since only it knows whether revision continues.
pub fn step_event(index: usize, result: &StepResult) -> PlanEvent {
    PlanEvent::StepCompleted {
        step_index: index,
        success: result.success,
    }
}

pub fn plan_created_event(plan: &Plan) -> PlanEvent {
    PlanEvent::PlanCreated {
        plan_id: plan.id.clone(),
    }
}
