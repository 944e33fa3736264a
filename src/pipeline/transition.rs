//! `TransitionPostProcessor` (§4.5).

use crate::expr;
use crate::model::workflow::{Node, TransitionRule};
use crate::state::{HensuState, NodeResult};

/// Resolves the node's next `currentNodeId` (§4.5): `loopBreakTarget`, if
/// set, wins unconditionally and is cleared; otherwise the first matching
/// transition rule in declaration order wins; if nothing matches, the
/// execution goes terminal (`None`).
pub fn run(node: &Node, state: &mut HensuState, result: &NodeResult) {
    if let Some(target) = state.loop_break_target.take() {
        state.current_node_id = Some(target);
        return;
    }

    let context_snapshot: std::collections::HashMap<String, serde_json::Value> = state
        .context
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();

    for rule in &node.transition_rules {
        let matched = match rule {
            TransitionRule::Success { .. } => result.is_success(),
            TransitionRule::Failure { .. } => !result.is_success(),
            TransitionRule::Conditional { predicate, .. } => {
                expr::evaluate(predicate, &context_snapshot)
            }
            // Handled by RubricPostProcessor directly; never matched here.
            TransitionRule::RubricFail { .. } => false,
        };
        if matched {
            state.current_node_id = Some(rule.target().to_string());
            return;
        }
    }

    state.current_node_id = None;
}
