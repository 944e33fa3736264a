//! `AgenticNodeExecutor` (§4.7): the planning pipeline entry point for a
//! Standard node with `planningConfig.enabled`.
//!
//! A node can suspend twice: once for plan review (before any step runs)
//! and once for a post-execution review (after the whole plan pass
//! completes). Both gates are driven by the same `planningConfig.review`
//! flag (§9 design note). Resumption is detected from markers this
//! function itself writes into `state.context` before returning PENDING,
//! since `state.context` — not a `NodeResult`'s metadata — is what a
//! checkpoint actually persists.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::listeners::PlanEvent;
use crate::model::plan::{Plan, PlanStepAction, PlannedStep};
use crate::model::workflow::{Node, NodeKind, PlanConstraints, Workflow};
use crate::planning::plan_executor::PlanExecutor;
use crate::planning::planner::{PlanRequest, RevisionContext};
use crate::state::{HensuState, NodeResult};

const PLAN_CONTEXT_KEY: &str = "_plan";
const PLAN_SUMMARY_CONTEXT_KEY: &str = "_plan_execution_summary";

fn default_constraints() -> PlanConstraints {
    PlanConstraints {
        max_steps: 10,
        max_replans: 0,
        max_duration_ms: 300_000,
        max_token_budget: None,
        allow_replan: false,
    }
}

fn enrich_synthesize(steps: &mut [PlannedStep], default_agent_id: &str) {
    for step in steps.iter_mut() {
        if let PlanStepAction::Synthesize { agent_id, .. } = &mut step.action {
            if agent_id.is_none() {
                *agent_id = Some(default_agent_id.to_string());
            }
        }
    }
}

fn fail_result(message: impl Into<String>, plan_failure_target: Option<&str>) -> NodeResult {
    let mut result = NodeResult::failure(message);
    if let Some(target) = plan_failure_target {
        result
            .metadata
            .insert("_plan_failure_target".to_string(), Json::String(target.to_string()));
    }
    result
}

fn context_snapshot(state: &HensuState) -> HashMap<String, Json> {
    state.context.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
}

/// `PlanExecutionProcessor` (§4.9): runs the plan, replanning on failure
/// while `allowReplan` and `maxReplans` permit it.
async fn run_plan_execution_processor(
    plan: &mut Plan,
    kernel: &Kernel,
    base_context: &HashMap<String, Json>,
    agent_id: &str,
    plan_failure_target: Option<&str>,
) -> NodeResult {
    let executor = PlanExecutor {
        step_registry: &kernel.step_registry,
        listeners: &kernel.listeners,
    };

    let mut replans: usize = 0;
    loop {
        let plan_result = executor.execute(plan, base_context).await;

        if plan_result.success() {
            kernel
                .listeners
                .fire_plan_event(PlanEvent::PlanCompleted { success: true, reason: None })
                .await;
            return NodeResult::success(plan_result.output.unwrap_or(Json::Null));
        }

        if !plan.constraints.allow_replan || replans >= plan.constraints.max_replans {
            kernel
                .listeners
                .fire_plan_event(PlanEvent::PlanCompleted {
                    success: false,
                    reason: plan_result.error.clone(),
                })
                .await;
            return fail_result(
                plan_result.error.unwrap_or_else(|| "plan execution failed".to_string()),
                plan_failure_target,
            );
        }

        let Some(failed_step) = plan_result.step_results.last() else {
            return fail_result("plan failed with no recorded step result", plan_failure_target);
        };

        let revision_prompt = format!(
            "Step {} failed: {}",
            failed_step.step_index,
            failed_step.error.as_deref().unwrap_or("unknown error")
        );
        let revision_ctx = RevisionContext::from_failure(failed_step, revision_prompt, Vec::new());

        let old_plan_id = plan.id.clone();
        match kernel.planner.revise_plan(plan, &revision_ctx).await {
            Ok(mut revised) => {
                revised.node_id = plan.node_id.clone();
                enrich_synthesize(&mut revised.steps, agent_id);
                kernel
                    .listeners
                    .fire_plan_event(PlanEvent::PlanRevised {
                        old_plan_id,
                        new_plan_id: revised.id.clone(),
                    })
                    .await;
                *plan = revised;
                replans += 1;
            }
            Err(e) => {
                kernel
                    .listeners
                    .fire_plan_event(PlanEvent::PlanCompleted {
                        success: false,
                        reason: Some(e.to_string()),
                    })
                    .await;
                return fail_result(e.to_string(), plan_failure_target);
            }
        }
    }
}

pub async fn run(
    node: &Node,
    _workflow: &Workflow,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let NodeKind::Standard {
        prompt,
        agent_id,
        planning_config,
        plan_failure_target,
        ..
    } = &node.kind
    else {
        unreachable!("agentic::run called on a non-Standard node")
    };

    // Resuming after the post-execution review gate: the plan already
    // ran, only the approval was pending.
    if let Some((_, summary)) = state.context.remove(PLAN_SUMMARY_CONTEXT_KEY) {
        return Ok(serde_json::from_value(summary)
            .unwrap_or_else(|e| NodeResult::failure(format!("could not restore plan execution result: {e}"))));
    }

    // PlanCreationProcessor + ReviewGateProcessor (§4.7, §4.8).
    let mut plan: Plan = if let Some((_, serialized)) = state.context.remove(PLAN_CONTEXT_KEY) {
        match serde_json::from_value(serialized) {
            Ok(plan) => plan,
            Err(e) => return Ok(NodeResult::failure(format!("could not restore reviewed plan: {e}"))),
        }
    } else {
        let constraints = planning_config.constraints.clone().unwrap_or_else(default_constraints);
        let request = PlanRequest {
            goal: prompt.clone(),
            available_tools: Vec::new(),
            context: context_snapshot(state),
            constraints,
        };

        let mut plan = match kernel.planner.create_plan(&request).await {
            Ok(plan) => plan,
            Err(e) => return Ok(NodeResult::failure(format!("plan creation failed: {e}"))),
        };
        plan.node_id = node.id.clone();

        if planning_config.review {
            let serialized = serde_json::to_value(&plan).unwrap_or(Json::Null);
            state.context.insert(PLAN_CONTEXT_KEY.to_string(), serialized);
            let mut metadata = HashMap::new();
            metadata.insert("_plan_id".to_string(), Json::String(plan.id.clone()));
            metadata.insert("_plan_review_required".to_string(), Json::Bool(true));
            metadata.insert("_plan_steps".to_string(), Json::from(plan.steps.len()));
            return Ok(NodeResult::pending(metadata));
        }
        plan
    };

    // SynthesizeEnrichmentProcessor (§4.7): fill in any step that omitted
    // its agentId, defaulting to the node's own agent.
    enrich_synthesize(&mut plan.steps, agent_id);

    let base_context = context_snapshot(state);
    let exec_result =
        run_plan_execution_processor(&mut plan, kernel, &base_context, agent_id, plan_failure_target.as_deref()).await;

    // PostExecutionReviewGateProcessor (§4.7).
    if planning_config.review {
        let summary = serde_json::to_value(&exec_result).unwrap_or(Json::Null);
        state.context.insert(PLAN_SUMMARY_CONTEXT_KEY.to_string(), summary.clone());
        let mut metadata = HashMap::new();
        metadata.insert(PLAN_SUMMARY_CONTEXT_KEY.to_string(), summary);
        return Ok(NodeResult::pending(metadata));
    }

    Ok(exec_result)
}
