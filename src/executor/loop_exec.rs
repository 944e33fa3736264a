//! LoopNodeExecutor (§4.14).
//!
//! Each iteration dispatches `bodyNode` directly rather than re-entering
//! the full Workflow Loop, so a loop body's own pre/post pipeline and
//! transition rules are not run per iteration — only this executor's
//! break-rule evaluation is. Dispatching the body can itself reach back
//! into a node that dispatches a `Loop` (nested loops), so the recursive
//! call is boxed to keep the future's size finite.

use crate::error::WorkflowError;
use crate::executor;
use crate::expr;
use crate::kernel::Kernel;
use crate::model::workflow::{LoopConditionKind, Node, NodeKind, Workflow};
use crate::state::{HensuState, NodeResult};

pub async fn execute(
    node: &Node,
    workflow: &Workflow,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let NodeKind::Loop {
        body_node,
        max_iterations,
        condition,
        break_rules,
    } = &node.kind
    else {
        unreachable!("loop_exec::execute called on a non-Loop node")
    };

    let mut last_result = NodeResult::success(serde_json::Value::Null);
    let mut iteration: u32 = 0;

    while iteration < *max_iterations {
        let holds = match condition {
            LoopConditionKind::Always => true,
            LoopConditionKind::Expression(expr_str) => {
                let snapshot = state
                    .context
                    .iter()
                    .map(|e| (e.key().clone(), e.value().clone()))
                    .collect();
                expr::evaluate(expr_str, &snapshot)
            }
        };
        if !holds {
            break;
        }

        state
            .context
            .insert("loop_iteration".to_string(), serde_json::Value::from(iteration));

        last_result = Box::pin(executor::dispatch(workflow, body_node, kernel, state)).await?;

        state.context.insert(
            "loop_last_result".to_string(),
            last_result.output.clone().unwrap_or(serde_json::Value::Null),
        );

        iteration += 1;

        let break_snapshot: std::collections::HashMap<String, serde_json::Value> = state
            .context
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut broke = false;
        for rule in break_rules {
            let matched = match &rule.condition {
                LoopConditionKind::Always => true,
                LoopConditionKind::Expression(expr_str) => expr::evaluate(expr_str, &break_snapshot),
            };
            if matched {
                state.loop_break_target = Some(rule.target.clone());
                broke = true;
                break;
            }
        }
        if broke {
            return Ok(last_result);
        }
    }

    Ok(last_result)
}
