//! External agent/action interfaces (§6).
//!
//! The kernel consumes these traits; it never implements an LLM transport
//! or action bridge itself (Non-goals, §1). Mirrors the capability/intent
//! split of `llm_toolkit::agent::Agent`, but fixed to the kernel's own
//! `AgentResponse` shape instead of a generic associated `Output`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::model::plan::PlannedStep;

/// A response variant from an `Agent::execute` call (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentResponse {
    TextResponse {
        content: String,
        #[serde(default)]
        metadata: HashMap<String, Json>,
    },
    Error {
        message: String,
    },
    ToolRequest {
        tool_name: String,
        arguments: Json,
    },
    PlanProposal {
        steps: Vec<PlannedStep>,
        reasoning: String,
    },
}

/// An LLM-backed agent. Implementations live outside this crate (Non-goals
/// §1); the kernel only dispatches through this trait.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn execute(&self, prompt: &str, context: &HashMap<String, Json>) -> AgentResponse;
}

/// Registry mapping an `agentId` to a resolvable `Agent` (§6 `AgentRegistry`).
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    fn get_agent(&self, id: &str) -> Option<std::sync::Arc<dyn Agent>>;

    fn has_agent(&self, id: &str) -> bool {
        self.get_agent(id).is_some()
    }
}

/// Result of dispatching an `Action` (§6 `ActionExecutor`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub output: Option<Json>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        action: &crate::model::workflow::Action,
        context: &HashMap<String, Json>,
    ) -> ActionResult;
}
