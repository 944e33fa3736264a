//! Step Handler Registry (C7, §4.11): one handler per `PlanStepAction`
//! variant, dispatched by the `PlanExecutor`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as Json;

use crate::agent::{ActionExecutor, Agent, AgentRegistry, AgentResponse};
use crate::model::plan::{PlanStepAction, PlannedStep, StepResult};
use crate::model::workflow::Action;

#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, step: &PlannedStep, context: &HashMap<String, Json>) -> StepResult;
}

pub fn failure(step: &PlannedStep, tool_name: impl Into<String>, message: impl Into<String>) -> StepResult {
    failure_with_duration(step, tool_name, message, 0)
}

pub fn failure_with_duration(
    step: &PlannedStep,
    tool_name: impl Into<String>,
    message: impl Into<String>,
    duration_ms: u64,
) -> StepResult {
    StepResult {
        step_index: step.index,
        tool_name: tool_name.into(),
        success: false,
        output: None,
        error: Some(message.into()),
        duration_ms,
        metadata: Default::default(),
    }
}

/// Translates a `ToolCall` step into an `Action::Send` and dispatches it
/// through the same `ActionExecutor` Action nodes use (§4.11).
pub struct ToolCallStepHandler {
    pub action_executor: Arc<dyn ActionExecutor>,
}

#[async_trait]
impl StepHandler for ToolCallStepHandler {
    async fn handle(&self, step: &PlannedStep, context: &HashMap<String, Json>) -> StepResult {
        let PlanStepAction::ToolCall { tool_name, arguments } = &step.action else {
            return failure(step, "unknown", "step registered as ToolCall but action is not ToolCall");
        };

        let started = Instant::now();
        let action = Action::Send {
            handler_id: tool_name.clone(),
            payload: arguments.clone(),
        };
        let result = self.action_executor.execute(&action, context).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        StepResult {
            step_index: step.index,
            tool_name: tool_name.clone(),
            success: result.success,
            output: result.output,
            error: result.error,
            duration_ms,
            metadata: Default::default(),
        }
    }
}

/// Handles a `Synthesize` step by prompting an agent, appending any
/// already-collected tool outputs as context (§4.11).
pub struct SynthesizeStepHandler {
    pub agent_registry: Arc<dyn AgentRegistry>,
}

#[async_trait]
impl StepHandler for SynthesizeStepHandler {
    async fn handle(&self, step: &PlannedStep, context: &HashMap<String, Json>) -> StepResult {
        let PlanStepAction::Synthesize { agent_id, prompt } = &step.action else {
            return failure(step, "synthesize", "step registered as Synthesize but action is not Synthesize");
        };

        let Some(agent_id) = agent_id.as_ref().filter(|id| !id.trim().is_empty()) else {
            return failure(step, "synthesize", "Synthesize step has no agentId");
        };

        let Some(agent) = self.agent_registry.get_agent(agent_id) else {
            return failure(step, "synthesize", format!("agent '{agent_id}' is not registered"));
        };

        let mut collected: Vec<(&String, &Json)> = context
            .iter()
            .filter(|(k, _)| k.starts_with("_step_") && k.ends_with("_output"))
            .collect();
        collected.sort_by_key(|(k, _)| (*k).clone());

        let mut full_prompt = prompt.clone();
        if !collected.is_empty() {
            full_prompt.push_str("\n\n## Collected Tool Results\n");
            for (key, value) in collected {
                full_prompt.push_str(&format!("- {key}: {value}\n"));
            }
        }

        let started = Instant::now();
        let response = agent.execute(&full_prompt, context).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match response {
            AgentResponse::TextResponse { content, metadata } => StepResult {
                step_index: step.index,
                tool_name: "synthesize".to_string(),
                success: true,
                output: Some(Json::String(content)),
                error: None,
                duration_ms,
                metadata,
            },
            AgentResponse::Error { message } => failure_with_duration(step, "synthesize", message, duration_ms),
            AgentResponse::ToolRequest { .. } | AgentResponse::PlanProposal { .. } => {
                failure_with_duration(step, "synthesize", "agent returned a non-text response to a synthesize step", duration_ms)
            }
        }
    }
}

/// Resolves a `PlannedStep` to its registered handler by action kind
/// (§4.11). Each slot holds at most one handler; later registrations
/// replace earlier ones.
#[derive(Default)]
pub struct StepHandlerRegistry {
    tool_call: RwLock<Option<Arc<dyn StepHandler>>>,
    synthesize: RwLock<Option<Arc<dyn StepHandler>>>,
}

impl StepHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool_call(&self, handler: Arc<dyn StepHandler>) {
        *self.tool_call.write() = Some(handler);
    }

    pub fn register_synthesize(&self, handler: Arc<dyn StepHandler>) {
        *self.synthesize.write() = Some(handler);
    }

    pub async fn dispatch(&self, step: &PlannedStep, context: &HashMap<String, Json>) -> StepResult {
        let handler = match &step.action {
            PlanStepAction::ToolCall { .. } => self.tool_call.read().clone(),
            PlanStepAction::Synthesize { .. } => self.synthesize.read().clone(),
        };

        match handler {
            Some(handler) => handler.handle(step, context).await,
            None => failure(step, "unregistered", "no step handler registered for this action kind"),
        }
    }
}
