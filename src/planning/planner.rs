//! The `Planner` interface (§4.8) and two implementations: a static
//! template-filling planner and an LLM-backed one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::agent::{Agent, AgentResponse};
use crate::error::PlanError;
use crate::model::plan::{Plan, PlanSource, PlannedStep, StepStatus};
use crate::model::workflow::PlanConstraints;
use crate::template;

/// A tool available to the planner when composing a plan (§3 `PlanRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    #[serde(default)]
    pub available_tools: Vec<ToolDescriptor>,
    pub context: HashMap<String, Json>,
    pub constraints: PlanConstraints,
}

/// Supplied to `Planner::revise_plan` when a step has failed (§4.9).
pub struct RevisionContext {
    pub failed_step: StepResultRef,
    pub prompt: String,
    pub available_tools: Vec<ToolDescriptor>,
}

/// A minimal, owned projection of the failed step, avoiding a dependency
/// cycle between `planner` and the full `StepResult` persistence type.
pub struct StepResultRef {
    pub step_index: usize,
    pub error: Option<String>,
}

impl RevisionContext {
    pub fn from_failure(
        failed_step: &crate::model::plan::StepResult,
        prompt: impl Into<String>,
        available_tools: Vec<ToolDescriptor>,
    ) -> Self {
        RevisionContext {
            failed_step: StepResultRef {
                step_index: failed_step.step_index,
                error: failed_step.error.clone(),
            },
            prompt: prompt.into(),
            available_tools,
        }
    }
}

/// Composes and revises plans (§4.8). Implementations live outside this
/// crate or are provided here as reference defaults.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(&self, request: &PlanRequest) -> Result<Plan, PlanError>;
    async fn revise_plan(&self, current: &Plan, revision: &RevisionContext) -> Result<Plan, PlanError>;
}

/// Fills a fixed template of steps by brace-substitution from the request
/// context (§4.8: "deterministic planner for workflows with a known,
/// fixed step sequence"). Never revises — a fixed template has nothing to
/// revise into.
pub struct StaticPlanner {
    pub template: Vec<PlannedStep>,
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn create_plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        let steps = self
            .template
            .iter()
            .map(|step| PlannedStep {
                index: step.index,
                action: resolve_action(&step.action, &request.context),
                description: template::resolve_braces(&step.description, &request.context),
                status: StepStatus::Pending,
            })
            .collect();

        Ok(Plan::new(
            uuid::Uuid::new_v4().to_string(),
            request.goal.clone(),
            PlanSource::Static,
            steps,
            request.constraints.clone(),
        ))
    }

    async fn revise_plan(&self, _current: &Plan, _revision: &RevisionContext) -> Result<Plan, PlanError> {
        Err(PlanError::PlanRevisionFailed(
            "StaticPlanner has a fixed template and cannot revise".to_string(),
        ))
    }
}

fn resolve_action(
    action: &crate::model::plan::PlanStepAction,
    context: &HashMap<String, Json>,
) -> crate::model::plan::PlanStepAction {
    use crate::model::plan::PlanStepAction as A;
    match action {
        A::ToolCall { tool_name, arguments } => A::ToolCall {
            tool_name: template::resolve_braces(tool_name, context),
            arguments: template::resolve_json(arguments, context),
        },
        A::Synthesize { agent_id, prompt } => A::Synthesize {
            agent_id: agent_id.clone(),
            prompt: template::resolve_braces(prompt, context),
        },
    }
}

/// Delegates plan creation/revision to an `Agent`, parsing its response
/// into a `Plan` (§4.8: "an LLM call that proposes a plan").
pub struct LlmPlanner {
    pub agent: Arc<dyn Agent>,
}

fn parse_plan_response(content: &str, goal: &str, constraints: &PlanConstraints) -> Result<Plan, PlanError> {
    let steps: Vec<PlannedStep> = serde_json::from_str(content)
        .map_err(|e| PlanError::PlanCreationFailed(format!("could not parse plan steps: {e}")))?;
    if steps.is_empty() {
        return Err(PlanError::PlanCreationFailed("parsed plan has no steps".to_string()));
    }
    Ok(Plan::new(
        uuid::Uuid::new_v4().to_string(),
        goal,
        PlanSource::LlmGenerated,
        steps,
        constraints.clone(),
    ))
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn create_plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        let tool_names: Vec<&str> = request.available_tools.iter().map(|t| t.name.as_str()).collect();
        let prompt = format!(
            "Goal: {}\nAvailable tools: {}\nPropose a plan as a JSON array of steps.",
            request.goal,
            tool_names.join(", ")
        );

        match self.agent.execute(&prompt, &request.context).await {
            AgentResponse::PlanProposal { steps, .. } => {
                if steps.is_empty() {
                    return Err(PlanError::PlanCreationFailed("planner proposed an empty plan".to_string()));
                }
                Ok(Plan::new(
                    uuid::Uuid::new_v4().to_string(),
                    request.goal.clone(),
                    PlanSource::LlmGenerated,
                    steps,
                    request.constraints.clone(),
                ))
            }
            AgentResponse::TextResponse { content, .. } => parse_plan_response(&content, &request.goal, &request.constraints),
            AgentResponse::Error { message } => Err(PlanError::PlanCreationFailed(message)),
            AgentResponse::ToolRequest { .. } => {
                Err(PlanError::PlanCreationFailed("planner returned a tool request instead of a plan".to_string()))
            }
        }
    }

    async fn revise_plan(&self, current: &Plan, revision: &RevisionContext) -> Result<Plan, PlanError> {
        let prompt = format!(
            "The plan '{}' failed at step {}: {}\n{}\nPropose a revised plan as a JSON array of steps.",
            current.id,
            revision.failed_step.step_index,
            revision.failed_step.error.as_deref().unwrap_or("unknown error"),
            revision.prompt,
        );

        match self.agent.execute(&prompt, &HashMap::new()).await {
            AgentResponse::PlanProposal { steps, .. } => {
                if steps.is_empty() {
                    return Err(PlanError::PlanRevisionFailed("planner proposed an empty revision".to_string()));
                }
                Ok(Plan::new(
                    uuid::Uuid::new_v4().to_string(),
                    current.node_id.clone(),
                    PlanSource::LlmGenerated,
                    steps,
                    current.constraints.clone(),
                ))
            }
            AgentResponse::TextResponse { content, .. } => parse_plan_response(&content, &current.node_id, &current.constraints)
                .map_err(|e| PlanError::PlanRevisionFailed(e.to_string())),
            AgentResponse::Error { message } => Err(PlanError::PlanRevisionFailed(message)),
            AgentResponse::ToolRequest { .. } => {
                Err(PlanError::PlanRevisionFailed("planner returned a tool request instead of a revision".to_string()))
            }
        }
    }
}
