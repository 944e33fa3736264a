//! End node executor (§3 `End`).

use crate::error::WorkflowError;
use crate::model::workflow::ExitStatus;
use crate::state::{NodeResult, NodeStatus};

pub fn execute(status: ExitStatus) -> Result<NodeResult, WorkflowError> {
    let node_status = match status {
        ExitStatus::Success => NodeStatus::Success,
        ExitStatus::Failure => NodeStatus::Failure,
        ExitStatus::Cancelled => NodeStatus::Cancelled,
        ExitStatus::Pending => NodeStatus::Pending,
    };

    Ok(NodeResult {
        status: node_status,
        output: Some(serde_json::json!({ "exitStatus": format!("{status:?}") })),
        metadata: Default::default(),
    })
}
