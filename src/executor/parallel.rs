//! ParallelNodeExecutor (§4.12).
//!
//! Branches run concurrently via `futures::future::join_all` rather than
//! `tokio::spawn`: each branch closure borrows `kernel` and the context
//! snapshot, neither of which is `'static`, so spawning them onto the
//! runtime would require threading `Arc`s through call sites that don't
//! otherwise need them. Running the futures inline still overlaps their
//! I/O-bound agent calls.

use std::collections::HashMap;
use std::time::Duration;

use crate::agent::AgentResponse;
use crate::concurrency::BranchResult;
use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::model::workflow::{Branch, ConsensusConfig};
use crate::state::{HensuState, NodeResult};

/// The branch's declared output, falling back to its failure reason so a
/// failed branch still contributes something other than `null` to the
/// no-consensus output map (§8 scenario 4).
fn branch_output(result: &NodeResult) -> serde_json::Value {
    result
        .output
        .clone()
        .or_else(|| result.metadata.get("error").cloned())
        .unwrap_or(serde_json::Value::Null)
}

/// The failure reason recorded on a branch, for annotating `failed_branches`.
fn branch_failure_reason(result: &NodeResult) -> &str {
    result
        .metadata
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
}

async fn run_branch(branch: &Branch, kernel: &Kernel, context: &HashMap<String, serde_json::Value>) -> BranchResult {
    let result = match kernel.agent_registry.get_agent(&branch.agent_id) {
        None => NodeResult::failure(format!("agent '{}' is not registered", branch.agent_id)),
        Some(agent) => {
            let rendered = kernel.template_resolver.resolve(&branch.prompt, context);
            let timeout = Duration::from_millis(kernel.config.default_branch_timeout_ms);
            match tokio::time::timeout(timeout, agent.execute(&rendered, context)).await {
                Err(_) => NodeResult::failure("branch timed out"),
                Ok(AgentResponse::TextResponse { content, metadata }) => {
                    let mut r = NodeResult::success(serde_json::Value::String(content));
                    r.metadata = metadata;
                    r
                }
                Ok(AgentResponse::Error { message }) => NodeResult::failure(message),
                Ok(AgentResponse::ToolRequest { tool_name, arguments }) => {
                    NodeResult::success(serde_json::json!({ "toolRequest": tool_name, "arguments": arguments }))
                }
                Ok(AgentResponse::PlanProposal { steps, .. }) => {
                    NodeResult::success(serde_json::json!({ "planProposal": steps.len() }))
                }
            }
        }
    };
    BranchResult {
        branch_id: branch.id.clone(),
        result,
    }
}

pub async fn execute(
    branches: &[Branch],
    consensus: &Option<ConsensusConfig>,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let context_snapshot: HashMap<String, serde_json::Value> = state
        .context
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();

    let branch_results: Vec<BranchResult> =
        futures::future::join_all(branches.iter().map(|b| run_branch(b, kernel, &context_snapshot))).await;

    let failed_branches: Vec<String> = branch_results
        .iter()
        .filter(|b| !b.result.is_success())
        .map(|b| format!("{} ({})", b.branch_id, branch_failure_reason(&b.result)))
        .collect();
    state.context.insert(
        "failed_branches".to_string(),
        serde_json::Value::Array(failed_branches.iter().map(|s| serde_json::Value::String(s.clone())).collect()),
    );

    match consensus {
        None => {
            let all_ok = branch_results.iter().all(|b| b.result.is_success());
            let mut map = serde_json::Map::new();
            for branch in &branch_results {
                map.insert(branch.branch_id.clone(), branch_output(&branch.result));
            }
            if all_ok {
                Ok(NodeResult::success(serde_json::Value::Object(map)))
            } else {
                Ok(NodeResult::failure(format!(
                    "branches failed: {}",
                    failed_branches.join(", ")
                )))
            }
        }
        Some(config) => {
            let weights: HashMap<String, f64> = branches.iter().map(|b| (b.id.clone(), b.weight)).collect();
            let consensus_result = kernel.consensus_evaluator.evaluate(&branch_results, &weights, config).await;

            state.context.insert(
                "consensus_reached".to_string(),
                serde_json::Value::Bool(consensus_result.reached),
            );
            state.context.insert(
                "consensus_votes".to_string(),
                serde_json::to_value(&consensus_result.votes).unwrap_or(serde_json::Value::Null),
            );
            if let Some(winner) = &consensus_result.winning_branch {
                state.context.insert(
                    "consensus_winning_branch".to_string(),
                    serde_json::Value::String(winner.clone()),
                );
            }
            state.context.insert(
                "consensus_result".to_string(),
                serde_json::to_value(&consensus_result).unwrap_or(serde_json::Value::Null),
            );

            if consensus_result.reached {
                let winning_output = consensus_result
                    .winning_branch
                    .as_ref()
                    .and_then(|id| branch_results.iter().find(|b| &b.branch_id == id))
                    .and_then(|b| b.result.output.clone())
                    .unwrap_or(serde_json::Value::Null);
                Ok(NodeResult::success(winning_output))
            } else {
                Ok(NodeResult::failure("consensus not reached"))
            }
        }
    }
}
