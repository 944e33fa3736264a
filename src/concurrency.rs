//! Concurrency primitives (C8, §4.12, §4.13, §5).
//!
//! Fork/Join context bookkeeping and the consensus evaluator contract used
//! by the Parallel executor. `ForkJoinContext` is the thing stored under
//! `state.context["_fork_context_" + forkNodeId]` (§4.13).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::state::NodeResult;

/// Per-target outcome recorded into a `ForkJoinContext` (§4.13).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkResult {
    pub status: ForkTargetStatus,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub result: Option<NodeResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForkTargetStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Bookkeeping for one Fork node's outstanding targets, shared between the
/// spawning Fork executor and any Join nodes awaiting it (§4.13).
#[derive(Debug, Default)]
pub struct ForkJoinContext {
    pub fork_node_id: String,
    results: RwLock<HashMap<String, ForkResult>>,
    expected_targets: Vec<String>,
}

impl ForkJoinContext {
    pub fn new(fork_node_id: impl Into<String>, expected_targets: Vec<String>) -> Self {
        ForkJoinContext {
            fork_node_id: fork_node_id.into(),
            results: RwLock::new(HashMap::new()),
            expected_targets,
        }
    }

    pub fn record(&self, target_id: &str, result: ForkResult) {
        self.results.write().insert(target_id.to_string(), result);
    }

    pub fn all_complete(&self) -> bool {
        let results = self.results.read();
        self.expected_targets
            .iter()
            .all(|target| results.contains_key(target))
    }

    pub fn get(&self, target_id: &str) -> Option<ForkResult> {
        self.results.read().get(target_id).cloned()
    }

    pub fn results_in_order(&self, targets: &[String]) -> Vec<Option<ForkResult>> {
        let results = self.results.read();
        targets.iter().map(|t| results.get(t).cloned()).collect()
    }
}

pub const FORK_CONTEXT_KEY_PREFIX: &str = "_fork_context_";

pub fn fork_context_key(fork_node_id: &str) -> String {
    format!("{FORK_CONTEXT_KEY_PREFIX}{fork_node_id}")
}

/// Branch outcome produced by `ParallelNodeExecutor` (§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchResult {
    pub branch_id: String,
    pub result: NodeResult,
}

/// Outcome of consensus evaluation over a set of branch results (§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub reached: bool,
    pub votes: HashMap<String, usize>,
    pub winning_branch: Option<String>,
}

/// Pluggable vote-aggregation strategy (MAJORITY_VOTE, UNANIMOUS,
/// WEIGHTED_VOTE, JUDGE_DECIDES — §4.12). The executor only supplies
/// branch results and state; strategy implementation lives here.
#[async_trait]
pub trait ConsensusEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        branches: &[BranchResult],
        weights: &HashMap<String, f64>,
        config: &crate::model::workflow::ConsensusConfig,
    ) -> ConsensusResult;
}

/// Default evaluator implementing the four built-in strategies directly;
/// `JudgeDecides` requires an agent call and is supplied by the caller via
/// `judge`.
pub struct DefaultConsensusEvaluator {
    pub judge: Option<Arc<dyn crate::agent::Agent>>,
}

#[async_trait]
impl ConsensusEvaluator for DefaultConsensusEvaluator {
    async fn evaluate(
        &self,
        branches: &[BranchResult],
        weights: &HashMap<String, f64>,
        config: &crate::model::workflow::ConsensusConfig,
    ) -> ConsensusResult {
        use crate::model::workflow::ConsensusConfig as C;

        let mut votes: HashMap<String, usize> = HashMap::new();
        for branch in branches {
            if let Some(output) = branch.result.output.as_ref() {
                let key = output.to_string();
                *votes.entry(key).or_insert(0) += 1;
            }
        }

        match config {
            C::Unanimous => {
                let all_succeeded = branches.iter().all(|b| b.result.is_success());
                let all_same = branches
                    .windows(2)
                    .all(|w| w[0].result.output == w[1].result.output);
                ConsensusResult {
                    reached: all_succeeded && all_same,
                    votes,
                    winning_branch: branches.first().map(|b| b.branch_id.clone()),
                }
            }
            C::MajorityVote => {
                let winner = votes.iter().max_by_key(|(_, count)| **count);
                let reached = winner
                    .map(|(_, count)| *count * 2 > branches.len())
                    .unwrap_or(false);
                let winning_branch = winner.and_then(|(value, _)| {
                    branches
                        .iter()
                        .find(|b| b.result.output.as_ref().map(|o| o.to_string()).as_deref() == Some(value.as_str()))
                        .map(|b| b.branch_id.clone())
                });
                ConsensusResult {
                    reached,
                    votes,
                    winning_branch,
                }
            }
            C::WeightedVote { threshold } => {
                let mut weighted: HashMap<String, f64> = HashMap::new();
                let total_weight: f64 = branches
                    .iter()
                    .map(|b| weights.get(&b.branch_id).copied().unwrap_or(1.0))
                    .sum();
                for branch in branches {
                    if let Some(output) = branch.result.output.as_ref() {
                        let w = weights.get(&branch.branch_id).copied().unwrap_or(1.0);
                        *weighted.entry(output.to_string()).or_insert(0.0) += w;
                    }
                }
                let winner = weighted
                    .iter()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
                let reached = winner
                    .map(|(_, w)| total_weight > 0.0 && *w / total_weight >= *threshold)
                    .unwrap_or(false);
                let winning_branch = winner.and_then(|(value, _)| {
                    branches
                        .iter()
                        .find(|b| b.result.output.as_ref().map(|o| o.to_string()).as_deref() == Some(value.as_str()))
                        .map(|b| b.branch_id.clone())
                });
                ConsensusResult {
                    reached,
                    votes,
                    winning_branch,
                }
            }
            C::JudgeDecides { .. } => {
                let judge = match &self.judge {
                    Some(j) => j.clone(),
                    None => {
                        return ConsensusResult {
                            reached: false,
                            votes,
                            winning_branch: None,
                        }
                    }
                };
                let prompt = format!(
                    "Decide the winning branch among: {:?}",
                    branches.iter().map(|b| &b.branch_id).collect::<Vec<_>>()
                );
                let response = judge.execute(&prompt, &HashMap::new()).await;
                let winning_branch = match response {
                    crate::agent::AgentResponse::TextResponse { content, .. } => {
                        branches.iter().find(|b| content.contains(&b.branch_id)).map(|b| b.branch_id.clone())
                    }
                    _ => None,
                };
                ConsensusResult {
                    reached: winning_branch.is_some(),
                    votes,
                    winning_branch,
                }
            }
        }
    }
}

/// Registry for `CUSTOM` Join merge strategies (§4.13).
pub trait CustomMerger: Send + Sync {
    fn merge(&self, outputs: Vec<Option<Json>>) -> Json;
}

#[derive(Default)]
pub struct CustomMergerRegistry {
    mergers: RwLock<HashMap<String, Arc<dyn CustomMerger>>>,
}

impl CustomMergerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, merger: Arc<dyn CustomMerger>) {
        self.mergers.write().insert(name.into(), merger);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomMerger>> {
        self.mergers.read().get(name).cloned()
    }
}
