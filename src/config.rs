//! Engine-wide configuration (§6 options table, ambient stack §10.3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricStorageType {
    Memory,
    File,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowEngineConfig {
    /// Choose lightweight-task scheduler vs fixed pool.
    pub use_virtual_threads: bool,
    /// Pool size when `use_virtual_threads` is false.
    pub thread_pool_size: usize,
    /// Opaque to the core; interpreted by the rubric storage backend.
    pub rubric_storage_type: RubricStorageType,
    /// Default per-branch timeout for Parallel nodes (§4.12, §5).
    pub default_branch_timeout_ms: u64,
    /// Default lease staleness window for the repository claim protocol
    /// (§4.16).
    pub default_lease_threshold_secs: i64,
}

impl Default for WorkflowEngineConfig {
    fn default() -> Self {
        WorkflowEngineConfig {
            use_virtual_threads: true,
            thread_pool_size: num_cpus_fallback(),
            rubric_storage_type: RubricStorageType::Memory,
            default_branch_timeout_ms: 300_000,
            default_lease_threshold_secs: crate::repository::DEFAULT_LEASE_PERIOD_SECS,
        }
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
