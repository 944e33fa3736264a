//! Review and rubric gate hooks (C10, §4.3, §4.4, §6).
//!
//! The kernel defines the contracts; human decision collection and rubric
//! scoring algorithms are external collaborators (Non-goals, §1).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::model::workflow::Node;
use crate::state::{HensuState, NodeResult};

/// A human reviewer's decision on a node's result (§4.3).
#[derive(Debug, Clone)]
pub enum ReviewDecision {
    Approve {
        edited_state: Option<HashMap<String, Json>>,
    },
    Backtrack {
        target_node: String,
        edited_context: Option<HashMap<String, Json>>,
        reason: String,
        edited_prompt: Option<String>,
    },
    Reject {
        reason: String,
    },
    /// No decision is available yet; suspend the Workflow Loop and
    /// require an external resumption (§4.3, §6: "Review gate: ...
    /// returns PENDING if asynchronous") instead of blocking in-process.
    Pending,
}

#[async_trait]
pub trait ReviewHandler: Send + Sync {
    /// Either returns a human decision or, if one isn't available yet,
    /// `ReviewDecision::Pending` so the caller can suspend rather than
    /// block indefinitely (§4.3).
    async fn request_review(
        &self,
        node: &Node,
        state: &HensuState,
        result: &NodeResult,
    ) -> ReviewDecision;
}

/// Output of scoring a node's result against a rubric (§6 `RubricEngine`).
#[derive(Debug, Clone)]
pub struct RubricEvaluationResult {
    pub score: f64,
    pub passed: bool,
    pub rubric_id: String,
}

#[async_trait]
pub trait RubricEngine: Send + Sync {
    async fn evaluate(
        &self,
        rubric_id: &str,
        output: &Json,
        context: &HashMap<String, Json>,
    ) -> RubricEvaluationResult;
}
