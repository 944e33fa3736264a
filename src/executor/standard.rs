//! StandardNodeExecutor (§4.6).

use std::collections::HashMap;

use crate::agent::AgentResponse;
use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::model::workflow::Node;
use crate::state::{HensuState, NodeResult};

pub async fn execute(
    node: &Node,
    prompt: &str,
    agent_id: &str,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let agent = kernel
        .agent_registry
        .get_agent(agent_id)
        .ok_or_else(|| WorkflowError::UnresolvedAgent(agent_id.to_string()))?;

    let context_snapshot: HashMap<String, serde_json::Value> = state
        .context
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();

    // A review decision (§4.3) may have left an override prompt for this
    // specific node; it is one-shot and consumed here.
    let override_key = format!("_prompt_override_{}", node.id);
    let rendered = match state.context.remove(&override_key) {
        Some((_, serde_json::Value::String(s))) => s,
        _ => kernel.template_resolver.resolve(prompt, &context_snapshot),
    };

    state
        .context
        .insert("current_node".to_string(), serde_json::Value::String(node.id.clone()));

    kernel.listeners.fire_agent_start(agent_id, &rendered).await;
    let response = agent.execute(&rendered, &context_snapshot).await;
    kernel.listeners.fire_agent_complete(agent_id).await;

    let result = match response {
        AgentResponse::TextResponse { content, metadata } => {
            let mut result = NodeResult::success(serde_json::Value::String(content));
            result.metadata = metadata;
            result
        }
        AgentResponse::Error { message } => NodeResult::failure(message),
        AgentResponse::ToolRequest { tool_name, arguments } => {
            NodeResult::success(serde_json::json!({
                "toolRequest": tool_name,
                "arguments": arguments,
            }))
        }
        AgentResponse::PlanProposal { steps, reasoning } => NodeResult::success(serde_json::json!({
            "planProposal": steps.len(),
            "reasoning": reasoning,
        })),
    };

    Ok(result)
}
