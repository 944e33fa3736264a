//! ActionNodeExecutor (§3 `Action`, §6 `ActionExecutor`).

use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::model::workflow::Action;
use crate::state::{HensuState, NodeResult};

pub async fn execute(
    actions: &[Action],
    kernel: &Kernel,
    state: &HensuState,
) -> Result<NodeResult, WorkflowError> {
    let context_snapshot = state
        .context
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();

    let mut outputs = Vec::with_capacity(actions.len());
    let mut errors = Vec::new();
    for action in actions {
        let result = kernel.action_executor.execute(action, &context_snapshot).await;
        if !result.success {
            errors.push(result.error.clone().unwrap_or_else(|| result.message.clone()));
        }
        outputs.push(serde_json::json!({
            "success": result.success,
            "message": result.message,
            "output": result.output,
        }));
    }

    if errors.is_empty() {
        Ok(NodeResult::success(serde_json::Value::Array(outputs)))
    } else {
        Ok(NodeResult::failure(errors.join("; ")))
    }
}
