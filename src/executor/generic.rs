//! Dispatch to a user-registered `Generic` node handler (C2, §3 `Generic`).

use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::state::{HensuState, NodeResult};

pub async fn execute(
    executor_type: &str,
    config: &serde_json::Value,
    kernel: &Kernel,
    state: &HensuState,
) -> Result<NodeResult, WorkflowError> {
    let handler = kernel
        .generic_registry
        .get(executor_type)
        .ok_or_else(|| WorkflowError::NoExecutorForKind(executor_type.to_string()))?;

    handler.execute(config, kernel, state).await
}
