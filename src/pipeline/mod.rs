//! Pre/Post processor pipeline (C4, §4.1).
//!
//! Order is fixed by the spec and is not user-extensible (unlike Generic
//! node dispatch, C2), so the pipeline is a straight-line sequence of
//! function calls rather than a registered/iterated list of trait objects.
//! Each stage can short-circuit by returning `Some(PipelineShortCircuit)`.

pub mod checkpoint;
pub mod output_extraction;
pub mod review;
pub mod rubric;
pub mod transition;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::kernel::Kernel;
use crate::listeners::ListenerRegistry;
use crate::model::workflow::Node;
use crate::review_rubric::{RubricEngine, ReviewHandler};
use crate::state::{CheckpointReason, ExecutionStep, HensuState, NodeResult};

/// A short-circuit result a post-pipeline stage can force (§4.1 step 5,
/// §7). `Pending`/`Rejected` halt the Workflow Loop; `Pending` requires
/// external resumption, `Rejected` is terminal.
pub enum PipelineShortCircuit {
    Pending { metadata: HashMap<String, Json> },
    Rejected { reason: String },
}

/// Checkpoint → NodeStart (§4.1 step 3).
pub async fn run_pre_pipeline(state: &HensuState, node_id: &str, listeners: &ListenerRegistry) {
    checkpoint::run(state, listeners).await;
    listeners.fire_node_start(state, node_id).await;
}

/// OutputExtraction → NodeComplete → History → Review → Rubric →
/// Transition (§4.1 step 5). Returns `Some` if a stage short-circuited.
pub async fn run_post_pipeline(
    node: &Node,
    state: &mut HensuState,
    mut result: NodeResult,
    kernel: &Kernel,
) -> Option<PipelineShortCircuit> {
    // Resuming a previously-PENDING Review gate (§4.3): the result under
    // review was already extracted and journaled on the pass that
    // pended, so pick the gate back up directly instead of re-running
    // OutputExtraction/History against whatever the re-dispatched
    // executor just produced.
    if let Some((_, stored)) = state.context.remove(review::REVIEW_PENDING_CONTEXT_KEY) {
        if let Ok(restored) = serde_json::from_value::<NodeResult>(stored) {
            result = restored;
        }
        return run_review_onward(node, state, result, kernel).await;
    }

    // OutputExtraction
    result = output_extraction::run(
        &node.id,
        &node.kind,
        result,
        &state.context,
        kernel.max_output_bytes,
    );

    // NodeComplete
    kernel.listeners.fire_node_complete(state, &node.id).await;

    // If the executor itself already signalled PENDING (e.g. a planning
    // review gate, §4.7), propagate it without running the remaining
    // gates — history is not appended for a pre-PENDING attempt (§8
    // scenario 6).
    if result.status == crate::state::NodeStatus::Pending {
        return Some(PipelineShortCircuit::Pending {
            metadata: result.metadata.clone(),
        });
    }

    // History
    let snapshot = state.snapshot(CheckpointReason::Checkpoint, None);
    state.history.push(ExecutionStep {
        node_id: node.id.clone(),
        state_snapshot: snapshot,
        node_result: result.clone(),
        timestamp: chrono::Utc::now(),
    });

    run_review_onward(node, state, result, kernel).await
}

/// Review → Rubric → Transition (§4.1 step 5), shared by the fresh pass
/// and by a Review-gate resumption that skips straight past History.
async fn run_review_onward(
    node: &Node,
    state: &mut HensuState,
    result: NodeResult,
    kernel: &Kernel,
) -> Option<PipelineShortCircuit> {
    // Review
    let review_handler: Arc<dyn ReviewHandler> = kernel.review_handler.clone();
    match review::run(node, state, &result, &review_handler).await {
        review::ReviewOutcome::Pending { metadata } => {
            return Some(PipelineShortCircuit::Pending { metadata })
        }
        review::ReviewOutcome::Rejected { reason } => {
            return Some(PipelineShortCircuit::Rejected { reason })
        }
        review::ReviewOutcome::Redirected => return None,
        review::ReviewOutcome::PassThrough => {}
    }

    // Rubric — may itself redirect (§4.4); if it did, skip Transition so
    // it doesn't overwrite the rubric's redirect.
    let rubric_engine: Arc<dyn RubricEngine> = kernel.rubric_engine.clone();
    let before_rubric = state.current_node_id.clone();
    rubric::run(node, state, &result, &rubric_engine).await;
    if state.current_node_id != before_rubric {
        return None;
    }

    // Transition
    transition::run(node, state, &result);

    None
}
