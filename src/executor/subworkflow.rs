//! SubWorkflowNodeExecutor (§4.15).
//!
//! `input_mapping`/`output_mapping` are `{ thisSideKey: otherSideKey }`:
//! input keys name the child's context key, values name the parent's;
//! output keys name the parent's, values name the child's. Recursing into
//! `Kernel::execute` can itself reach another `SubWorkflow` node, so the
//! call is boxed.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::WorkflowError;
use crate::kernel::{ExecutionResult, Kernel};
use crate::model::workflow::ExitStatus;
use crate::state::{HensuState, NodeResult};

pub async fn execute(
    child_workflow_id: &str,
    input_mapping: &HashMap<String, String>,
    output_mapping: &HashMap<String, String>,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let child_workflow = match kernel.workflow_provider.workflow(child_workflow_id).await {
        Some(wf) => wf,
        None => return Ok(NodeResult::failure(format!("sub-workflow '{child_workflow_id}' not found"))),
    };

    let mut initial_context = HashMap::new();
    for (child_key, parent_key) in input_mapping {
        if let Some(value) = state.context.get(parent_key).map(|v| v.value().clone()) {
            initial_context.insert(child_key.clone(), value);
        }
    }

    let outcome = Box::pin(kernel.execute(child_workflow.as_ref(), initial_context)).await?;

    let child_state = match &outcome {
        ExecutionResult::Completed { state, .. }
        | ExecutionResult::Terminated { state }
        | ExecutionResult::Pending { state, .. }
        | ExecutionResult::Rejected { state, .. } => state,
    };

    for (parent_key, child_key) in output_mapping {
        if let Some(value) = child_state.context.get(child_key).map(|v| v.value().clone()) {
            state.context.insert(parent_key.clone(), value);
        }
    }

    match outcome {
        ExecutionResult::Completed { status, .. } => match status {
            ExitStatus::Success => Ok(NodeResult::success(Json::String(child_workflow_id.to_string()))),
            ExitStatus::Failure | ExitStatus::Cancelled | ExitStatus::Pending => {
                Ok(NodeResult::failure(format!("sub-workflow '{child_workflow_id}' ended with {status:?}")))
            }
        },
        ExecutionResult::Terminated { .. } => Ok(NodeResult::success(Json::String(child_workflow_id.to_string()))),
        ExecutionResult::Pending { metadata, .. } => {
            let mut merged = metadata;
            merged.insert("_child_workflow_id".to_string(), Json::String(child_workflow_id.to_string()));
            Ok(NodeResult::pending(merged))
        }
        ExecutionResult::Rejected { reason, .. } => Ok(NodeResult::failure(reason)),
    }
}
