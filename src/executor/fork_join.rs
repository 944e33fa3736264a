//! Fork/Join executors (§4.13).
//!
//! A Fork's `ForkJoinContext` lives in `kernel.fork_contexts`, not in
//! `state.context`, because it holds a `parking_lot::RwLock` and is not
//! JSON-serializable. Dispatching a fork target can itself reach a node
//! that forks again, so the dispatch call is boxed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value as Json;

use crate::concurrency::{fork_context_key, ForkJoinContext, ForkResult, ForkTargetStatus};
use crate::error::WorkflowError;
use crate::executor;
use crate::kernel::Kernel;
use crate::model::workflow::{MergeStrategy, Node, TargetConfig, Workflow};
use crate::state::{HensuState, NodeResult};

pub async fn execute_fork(
    node: &Node,
    targets: &[String],
    _target_configs: &HashMap<String, TargetConfig>,
    wait_for_all: bool,
    workflow: &Workflow,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    // Per-target timeout/retry overrides (`_target_configs`) are not yet
    // consumed: every target currently runs with no override.
    let _ = wait_for_all;

    let fork_ctx = Arc::new(ForkJoinContext::new(node.id.clone(), targets.to_vec()));
    kernel.fork_contexts.insert(fork_context_key(&node.id), fork_ctx.clone());

    let target_runs = targets.iter().map(|target_id| {
        let mut target_state = state.clone();
        let fork_ctx = fork_ctx.clone();
        async move {
            let started = Instant::now();
            let outcome = Box::pin(executor::dispatch(workflow, target_id, kernel, &mut target_state)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(result) => {
                    let status = if result.is_success() {
                        ForkTargetStatus::Completed
                    } else {
                        ForkTargetStatus::Failed
                    };
                    fork_ctx.record(
                        target_id,
                        ForkResult {
                            status,
                            elapsed_ms,
                            result: Some(result.clone()),
                            error: None,
                        },
                    );
                    (target_id.clone(), Some(result))
                }
                Err(err) => {
                    fork_ctx.record(
                        target_id,
                        ForkResult {
                            status: ForkTargetStatus::Failed,
                            elapsed_ms,
                            result: None,
                            error: Some(err.to_string()),
                        },
                    );
                    (target_id.clone(), None)
                }
            }
        }
    });

    let outcomes: Vec<(String, Option<NodeResult>)> = futures::future::join_all(target_runs).await;

    for (target_id, result) in &outcomes {
        state.context.insert(
            target_id.clone(),
            result.as_ref().and_then(|r| r.output.clone()).unwrap_or(Json::Null),
        );
    }

    let all_ok = outcomes
        .iter()
        .all(|(_, r)| r.as_ref().map(|r| r.is_success()).unwrap_or(false));

    if all_ok {
        Ok(NodeResult::success(serde_json::json!({ "forkedTargets": targets })))
    } else {
        Ok(NodeResult::failure("one or more fork targets failed"))
    }
}

fn find_result(kernel: &Kernel, target_id: &str) -> Option<ForkResult> {
    kernel.fork_contexts.iter().find_map(|entry| entry.value().get(target_id))
}

pub async fn execute_join(
    await_targets: &[String],
    merge_strategy: &MergeStrategy,
    output_field: &str,
    timeout_ms: u64,
    fail_on_any_error: bool,
    kernel: &Kernel,
    state: &mut HensuState,
) -> Result<NodeResult, WorkflowError> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let mut collected: HashMap<String, ForkResult> = HashMap::new();

    loop {
        for target in await_targets {
            if !collected.contains_key(target) {
                if let Some(r) = find_result(kernel, target) {
                    collected.insert(target.clone(), r);
                }
            }
        }
        if collected.len() == await_targets.len() {
            break;
        }
        if timeout_ms > 0 && start.elapsed() >= timeout {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let timed_out = collected.len() < await_targets.len();
    let any_failed = timed_out
        || collected
            .values()
            .any(|r| r.status != ForkTargetStatus::Completed);

    if any_failed && fail_on_any_error {
        return Ok(NodeResult::failure(if timed_out {
            "join timed out waiting for fork targets"
        } else {
            "one or more awaited fork targets failed"
        }));
    }

    let outputs: Vec<Option<Json>> = await_targets
        .iter()
        .map(|t| collected.get(t).and_then(|r| r.result.clone()).and_then(|nr| nr.output))
        .collect();

    let merged = match merge_strategy {
        MergeStrategy::CollectAll => Json::Array(outputs.into_iter().map(|o| o.unwrap_or(Json::Null)).collect()),
        MergeStrategy::FirstCompleted => outputs.into_iter().flatten().next().unwrap_or(Json::Null),
        MergeStrategy::Concatenate => {
            let joined = outputs
                .iter()
                .map(|o| match o {
                    Some(Json::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect::<Vec<_>>()
                .join("");
            Json::String(joined)
        }
        MergeStrategy::MergeMaps => {
            let mut map = serde_json::Map::new();
            for output in outputs.into_iter().flatten() {
                if let Json::Object(obj) = output {
                    map.extend(obj);
                }
            }
            Json::Object(map)
        }
        MergeStrategy::Custom { merger_name } => match kernel.merger_registry.get(merger_name) {
            Some(merger) => merger.merge(outputs),
            None => return Ok(NodeResult::failure(format!("no custom merger registered: {merger_name}"))),
        },
    };

    state.context.insert(output_field.to_string(), merged.clone());

    Ok(NodeResult::success(merged))
}
