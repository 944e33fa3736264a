//! `RubricPostProcessor` (§4.4).

use std::sync::Arc;

use crate::model::workflow::{Node, NodeKind, TransitionRule};
use crate::review_rubric::RubricEngine;
use crate::state::{BacktrackEvent, BacktrackType, HensuState, NodeResult, RubricEvaluation};

pub async fn run(node: &Node, state: &mut HensuState, result: &NodeResult, rubric_engine: &Arc<dyn RubricEngine>) {
    let rubric_id = match &node.kind {
        NodeKind::Standard {
            rubric_id: Some(id),
            ..
        } => id.clone(),
        _ => return,
    };

    let Some(output) = result.output.clone() else {
        return;
    };

    let context_snapshot: std::collections::HashMap<String, serde_json::Value> = state
        .context
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();

    let evaluation = rubric_engine.evaluate(&rubric_id, &output, &context_snapshot).await;

    state.rubric_evaluation = Some(RubricEvaluation {
        rubric_id: evaluation.rubric_id.clone(),
        score: evaluation.score,
        passed: evaluation.passed,
    });

    if !evaluation.passed {
        let fail_target = node
            .transition_rules
            .iter()
            .find_map(|rule| match rule {
                TransitionRule::RubricFail { target } => Some(target.clone()),
                _ => None,
            });
        if let Some(target) = fail_target {
            state.backtrack_log.push(BacktrackEvent {
                backtrack_type: BacktrackType::Automatic,
                from: node.id.clone(),
                to: target.clone(),
                reason: None,
                rubric_score: Some(evaluation.score),
                timestamp: chrono::Utc::now(),
            });
            state.current_node_id = Some(target);
        }
    }
}
