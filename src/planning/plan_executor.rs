//! `PlanExecutor` (§4.10): runs a `Plan` step by step against the
//! `StepHandlerRegistry`, firing lifecycle events as it goes.
//!
//! Deliberately does not fire `PlanCompleted` — only the calling
//! `PlanExecutionProcessor` (§4.9) knows whether a failure should trigger
//! a replan, so only it decides when the plan pass is truly done.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value as Json;

use crate::listeners::{plan_created_event, step_event, ListenerRegistry, PlanEvent};
use crate::model::plan::{Plan, PlanResult, PlanStatus, StepResult};
use crate::planning::step_registry::StepHandlerRegistry;

pub struct PlanExecutor<'a> {
    pub step_registry: &'a StepHandlerRegistry,
    pub listeners: &'a ListenerRegistry,
}

impl<'a> PlanExecutor<'a> {
    pub async fn execute(&self, plan: &Plan, initial_context: &HashMap<String, Json>) -> PlanResult {
        self.listeners.fire_plan_event(plan_created_event(plan)).await;

        let started = Instant::now();
        let mut context = initial_context.clone();
        let mut step_results = Vec::with_capacity(plan.steps.len());
        let mut last_output = None;

        for step in &plan.steps {
            if started.elapsed().as_millis() as u64 >= plan.constraints.max_duration_ms {
                return PlanResult {
                    status: PlanStatus::Timeout,
                    step_results,
                    failed_at_step: step.index as i64,
                    total_duration_ms: started.elapsed().as_millis() as u64,
                    output: last_output,
                    error: Some("plan exceeded maxDurationMs".to_string()),
                };
            }

            self.listeners
                .fire_plan_event(PlanEvent::StepStarted { step_index: step.index })
                .await;

            let result: StepResult = self.step_registry.dispatch(step, &context).await;

            self.listeners.fire_plan_event(step_event(step.index, &result)).await;

            if !result.success {
                let error = result.error.clone();
                step_results.push(result);
                return PlanResult {
                    status: PlanStatus::Failed,
                    step_results,
                    failed_at_step: step.index as i64,
                    total_duration_ms: started.elapsed().as_millis() as u64,
                    output: last_output,
                    error,
                };
            }

            context.insert(
                format!("_step_{}_output", step.index),
                result.output.clone().unwrap_or(Json::Null),
            );
            last_output = result.output.clone();
            context.insert("_last_output".to_string(), last_output.clone().unwrap_or(Json::Null));

            step_results.push(result);
        }

        PlanResult {
            status: PlanStatus::Completed,
            step_results,
            failed_at_step: -1,
            total_duration_ms: started.elapsed().as_millis() as u64,
            output: last_output,
            error: None,
        }
    }
}
