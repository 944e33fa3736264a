//! `ReviewPostProcessor` (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::model::workflow::{Node, NodeKind, ReviewMode};
use crate::review_rubric::{ReviewDecision, ReviewHandler};
use crate::state::{BacktrackEvent, BacktrackType, HensuState, NodeResult};

/// Context key a pended review result is stashed under, mirroring
/// `planning/agentic.rs`'s `PLAN_CONTEXT_KEY` pattern: a checkpoint
/// persists `state.context`, not a stage's local variables, so resuming
/// a review gate means restoring this rather than re-running History.
pub const REVIEW_PENDING_CONTEXT_KEY: &str = "_review_pending_result";

/// Outcome of the review stage: either pass through (node result
/// unchanged) or a short-circuit the caller must honor.
pub enum ReviewOutcome {
    PassThrough,
    /// A Backtrack decision already moved `state.current_node_id`; the
    /// remaining post-pipeline stages (Rubric, Transition) must not run,
    /// since they would evaluate the wrong node's rubric or overwrite the
    /// redirect (§4.3: "return empty (loop iterates on the new node)").
    Redirected,
    Rejected { reason: String },
    /// No decision available yet; `state.context[REVIEW_PENDING_CONTEXT_KEY]`
    /// already holds the result under review so resumption can pick the
    /// gate back up without re-running the node (§4.3, §6).
    Pending { metadata: HashMap<String, Json> },
}

pub async fn run(
    node: &Node,
    state: &mut HensuState,
    result: &NodeResult,
    review_handler: &Arc<dyn ReviewHandler>,
) -> ReviewOutcome {
    let review_config = match &node.kind {
        NodeKind::Standard { review_config, .. } => review_config.clone(),
        _ => return ReviewOutcome::PassThrough,
    };

    if review_config.mode == ReviewMode::Disabled {
        return ReviewOutcome::PassThrough;
    }
    if review_config.mode == ReviewMode::Optional && result.is_success() {
        return ReviewOutcome::PassThrough;
    }

    let decision = review_handler.request_review(node, state, result).await;
    match decision {
        ReviewDecision::Pending => {
            let serialized = serde_json::to_value(result).unwrap_or(Json::Null);
            state
                .context
                .insert(REVIEW_PENDING_CONTEXT_KEY.to_string(), serialized);
            let mut metadata = HashMap::new();
            metadata.insert("_review_pending".to_string(), Json::Bool(true));
            ReviewOutcome::Pending { metadata }
        }
        ReviewDecision::Approve { edited_state } => {
            if let Some(edited) = edited_state {
                if review_config.allow_state_edit {
                    state.context.clear();
                    for (k, v) in edited {
                        state.context.insert(k, v);
                    }
                }
            }
            ReviewOutcome::PassThrough
        }
        ReviewDecision::Backtrack {
            target_node,
            edited_context,
            reason,
            edited_prompt,
        } => {
            if !review_config.allow_backtrack {
                return ReviewOutcome::PassThrough;
            }
            if let Some(edited) = edited_context {
                if review_config.allow_state_edit {
                    for (k, v) in edited {
                        state.context.insert(k, v);
                    }
                }
            }
            state.backtrack_log.push(BacktrackEvent {
                backtrack_type: BacktrackType::Manual,
                from: node.id.clone(),
                to: target_node.clone(),
                reason: Some(reason),
                rubric_score: None,
                timestamp: chrono::Utc::now(),
            });
            if let Some(prompt) = edited_prompt {
                state
                    .context
                    .insert(format!("_prompt_override_{target_node}"), Json::String(prompt));
            }
            state.current_node_id = Some(target_node);
            ReviewOutcome::Redirected
        }
        ReviewDecision::Reject { reason } => ReviewOutcome::Rejected { reason },
    }
}
