//! Per-node executors (C3, §4.6–§4.15).
//!
//! Dispatch from node kind to executor is an exhaustive match rather than
//! a registry, following the design note in §9 ("prefer the match for
//! performance-critical executors, the registry for user-extensible
//! ones"). `Generic` is the one kind that *is* registry-shaped (C2).

pub mod action;
pub mod end;
pub mod fork_join;
pub mod generic;
pub mod loop_exec;
pub mod parallel;
pub mod standard;
pub mod subworkflow;

use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::model::workflow::{NodeKind, Workflow};
use crate::state::{HensuState, NodeResult};

pub async fn dispatch(
    workflow: &Workflow,
    node_id: &str,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let node = workflow
        .node(node_id)
        .ok_or_else(|| WorkflowError::MissingNode(node_id.to_string()))?;

    match &node.kind {
        NodeKind::Standard { planning_config, .. } if planning_config.enabled => {
            crate::planning::agentic::run(node, workflow, kernel, state).await
        }
        NodeKind::Standard { prompt, agent_id, .. } => {
            standard::execute(node, prompt, agent_id, kernel, state).await
        }
        NodeKind::Action { actions } => action::execute(actions, kernel, state).await,
        NodeKind::Loop { .. } => loop_exec::execute(node, workflow, kernel, state).await,
        NodeKind::Parallel { branches, consensus } => {
            parallel::execute(branches, consensus, kernel, state).await
        }
        NodeKind::Fork {
            targets,
            target_configs,
            wait_for_all,
        } => fork_join::execute_fork(node, targets, target_configs, *wait_for_all, workflow, kernel, state).await,
        NodeKind::Join {
            await_targets,
            merge_strategy,
            output_field,
            timeout_ms,
            fail_on_any_error,
        } => fork_join::execute_join(await_targets, merge_strategy, output_field, *timeout_ms, *fail_on_any_error, kernel, state).await,
        NodeKind::SubWorkflow {
            child_workflow_id,
            input_mapping,
            output_mapping,
        } => subworkflow::execute(child_workflow_id, input_mapping, output_mapping, kernel, state).await,
        NodeKind::End { status } => end::execute(*status),
        NodeKind::Generic { executor_type, config } => generic::execute(executor_type, config, kernel, state).await,
    }
}
