//! Workflow Loop (C5, §4.1) and the kernel dependency-injection container.
//!
//! `Kernel` bundles every external collaborator (§6) the executors and
//! pipeline stages need. It owns one piece of runtime-only state itself:
//! the fork/join side-table. `state.context` can only ever hold JSON
//! (§3), so the live, lock-backed `ForkJoinContext` used to coordinate a
//! Fork's targets cannot live there — it is kept here instead, keyed the
//! same way (`fork_context_key`), and is never persisted.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as Json;

use crate::agent::{ActionExecutor, AgentRegistry};
use crate::concurrency::{ConsensusEvaluator, CustomMergerRegistry, ForkJoinContext};
use crate::config::WorkflowEngineConfig;
use crate::error::WorkflowError;
use crate::executor;
use crate::listeners::ListenerRegistry;
use crate::model::workflow::{ExitStatus, Workflow};
use crate::pipeline::{self, PipelineShortCircuit};
use crate::planning::planner::Planner;
use crate::planning::step_registry::StepHandlerRegistry;
use crate::registry::GenericHandlerRegistry;
use crate::review_rubric::{ReviewHandler, RubricEngine};
use crate::state::{HensuSnapshot, HensuState};
use crate::template::TemplateResolver;

/// Resolves a child workflow by id for `SubWorkflow` nodes (§4.15). The
/// workflow repository (C9) is the natural backing store but is not the
/// only possible one, so this gets its own narrow trait.
#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    async fn workflow(&self, id: &str) -> Option<Arc<Workflow>>;
}

/// Terminal outcome of one Workflow Loop invocation (§4.1, §7).
pub enum ExecutionResult {
    /// Hit an `End` node; carries its `ExitStatus`.
    Completed { status: ExitStatus, state: HensuState },
    /// Transitioned to `null` with no matching rule and no `End` node.
    Terminated { state: HensuState },
    /// A review gate short-circuited; resume via `Kernel::resume` once a
    /// decision is available.
    Pending {
        state: HensuState,
        metadata: HashMap<String, Json>,
    },
    /// A human reviewer rejected the node result.
    Rejected { state: HensuState, reason: String },
}

/// The dependency-injection container every executor and pipeline stage
/// is handed (§6 External Interfaces). The kernel implements none of
/// these collaborators itself (Non-goals, §1).
pub struct Kernel {
    pub agent_registry: Arc<dyn AgentRegistry>,
    pub action_executor: Arc<dyn ActionExecutor>,
    pub review_handler: Arc<dyn ReviewHandler>,
    pub rubric_engine: Arc<dyn RubricEngine>,
    pub template_resolver: Arc<dyn TemplateResolver>,
    pub planner: Arc<dyn Planner>,
    pub step_registry: Arc<StepHandlerRegistry>,
    pub generic_registry: Arc<GenericHandlerRegistry>,
    pub consensus_evaluator: Arc<dyn ConsensusEvaluator>,
    pub merger_registry: Arc<CustomMergerRegistry>,
    pub workflow_provider: Arc<dyn WorkflowProvider>,
    pub listeners: Arc<ListenerRegistry>,
    pub config: WorkflowEngineConfig,
    pub max_output_bytes: usize,
    pub fork_contexts: DashMap<String, Arc<ForkJoinContext>>,
}

impl Kernel {
    /// Runs a fresh execution from `workflow.startNodeId` (§4.1).
    pub async fn execute(
        &self,
        workflow: &Workflow,
        initial_context: HashMap<String, Json>,
    ) -> Result<ExecutionResult, WorkflowError> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let state = HensuState::new(execution_id, workflow.id.clone(), workflow.start_node_id.clone());
        for (k, v) in initial_context {
            state.context.insert(k, v);
        }
        self.run_loop(workflow, state).await
    }

    /// Resumes a previously-PENDING execution from a persisted snapshot
    /// (§5 Suspension points).
    pub async fn resume(
        &self,
        workflow: &Workflow,
        snapshot: &HensuSnapshot,
    ) -> Result<ExecutionResult, WorkflowError> {
        let state = HensuState::from_snapshot(snapshot);
        self.run_loop(workflow, state).await
    }

    async fn run_loop(&self, workflow: &Workflow, mut state: HensuState) -> Result<ExecutionResult, WorkflowError> {
        loop {
            let Some(node_id) = state.current_node_id.clone() else {
                return Ok(ExecutionResult::Terminated { state });
            };

            let node = workflow
                .node(&node_id)
                .ok_or_else(|| WorkflowError::MissingNode(node_id.clone()))?
                .clone();

            tracing::debug!(target: "hensu_workflow::loop", execution_id = %state.execution_id, node_id = %node.id, "entering node");

            pipeline::run_pre_pipeline(&state, &node.id, &self.listeners).await;

            let result = executor::dispatch(workflow, &node_id, self, &mut state).await?;

            match pipeline::run_post_pipeline(&node, &mut state, result, self).await {
                Some(PipelineShortCircuit::Pending { metadata }) => {
                    return Ok(ExecutionResult::Pending { state, metadata });
                }
                Some(PipelineShortCircuit::Rejected { reason }) => {
                    return Ok(ExecutionResult::Rejected { state, reason });
                }
                None => {}
            }

            if let crate::model::workflow::NodeKind::End { status } = &node.kind {
                return Ok(ExecutionResult::Completed { status: *status, state });
            }
        }
    }
}
