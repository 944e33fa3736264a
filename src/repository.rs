//! Repository & lease protocol (C9, §4.16, §8 scenario 7).
//!
//! The kernel defines the storage contracts only — JDBC/in-memory backends
//! are external collaborators (Non-goals, §1). The lease bookkeeping
//! (`apply_save_lease`, `claim`) is pure logic over the lease columns and
//! is exercised directly by tests without a real backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::RepositoryError;
use crate::model::workflow::Workflow;
use crate::state::{CheckpointReason, HensuSnapshot};

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn save(&self, tenant: &str, workflow: Workflow) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, tenant: &str, id: &str) -> Result<Option<Workflow>, RepositoryError>;
    async fn find_all(&self, tenant: &str) -> Result<Vec<Workflow>, RepositoryError>;
    async fn exists(&self, tenant: &str, id: &str) -> Result<bool, RepositoryError>;
    async fn delete(&self, tenant: &str, id: &str) -> Result<(), RepositoryError>;
    async fn delete_all_for_tenant(&self, tenant: &str) -> Result<(), RepositoryError>;
    async fn count(&self, tenant: &str) -> Result<usize, RepositoryError>;
}

/// Lease columns carried on a state row (§4.16).
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseColumns {
    pub server_node_id: Option<String>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct StateRow {
    pub tenant: String,
    pub execution_id: String,
    pub workflow_id: String,
    pub snapshot: HensuSnapshot,
    pub lease: LeaseColumns,
}

impl StateRow {
    pub fn is_paused(&self) -> bool {
        self.lease.server_node_id.is_none() && self.snapshot.current_node_id.is_some()
    }
}

/// Applies the lease-write rule a `save()` with a fresh checkpoint reason
/// must follow (§4.16):
///
/// - `checkpointReason == Checkpoint` ⇒ claim the row for `this_node`.
/// - `checkpointReason ∈ {Completed, Paused, Cancelled}` or
///   `currentNodeId == None` ⇒ clear both lease columns.
pub fn apply_save_lease(row: &mut StateRow, this_node: &str, now: DateTime<Utc>) {
    let terminal_or_suspended = matches!(
        row.snapshot.checkpoint_reason,
        CheckpointReason::Completed | CheckpointReason::Paused | CheckpointReason::Cancelled
    ) || row.snapshot.current_node_id.is_none();

    if terminal_or_suspended {
        row.lease.server_node_id = None;
        row.lease.last_heartbeat_at = None;
    } else if row.snapshot.checkpoint_reason == CheckpointReason::Checkpoint {
        row.lease.server_node_id = Some(this_node.to_string());
        row.lease.last_heartbeat_at = Some(now);
    }
}

/// `findPaused` predicate (§4.16, open question resolved per spec):
/// *paused* ⟺ `server_node_id IS NULL AND current_node_id IS NOT NULL`.
pub fn find_paused<'a>(rows: &'a [StateRow]) -> Vec<&'a StateRow> {
    rows.iter().filter(|r| r.is_paused()).collect()
}

/// Heartbeat tick (§4.16): only rows owned by `this_node` are touched.
/// The `server_node_id = this_node` clause is mandatory — without it a
/// node would bump rows it does not own and defeat failover detection.
pub fn heartbeat_tick(rows: &mut [StateRow], this_node: &str, now: DateTime<Utc>) {
    for row in rows.iter_mut() {
        if row.lease.server_node_id.as_deref() == Some(this_node) {
            row.lease.last_heartbeat_at = Some(now);
        }
    }
}

/// Claim (§4.16): atomically steals rows whose lease is stale
/// (`last_heartbeat_at < threshold`), reassigning them to `this_node`.
/// A fresh heartbeat (`last_heartbeat_at >= threshold`) is never claimed.
pub fn claim(
    rows: &mut [StateRow],
    this_node: &str,
    threshold: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let mut claimed = Vec::new();
    for row in rows.iter_mut() {
        let stale = row.lease.server_node_id.is_some()
            && row
                .lease
                .last_heartbeat_at
                .map(|hb| hb < threshold)
                .unwrap_or(false);
        if stale {
            row.lease.server_node_id = Some(this_node.to_string());
            row.lease.last_heartbeat_at = Some(now);
            claimed.push((row.tenant.clone(), row.execution_id.clone()));
        }
    }
    claimed
}

#[async_trait]
pub trait WorkflowStateRepository: Send + Sync {
    async fn save(&self, tenant: &str, row: StateRow) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        tenant: &str,
        execution_id: &str,
    ) -> Result<Option<StateRow>, RepositoryError>;
    async fn find_all(&self, tenant: &str) -> Result<Vec<StateRow>, RepositoryError>;
    async fn find_paused(&self, tenant: &str) -> Result<Vec<StateRow>, RepositoryError>;
    async fn find_by_workflow_id(
        &self,
        tenant: &str,
        workflow_id: &str,
    ) -> Result<Vec<StateRow>, RepositoryError>;
    async fn delete(&self, tenant: &str, execution_id: &str) -> Result<(), RepositoryError>;
}

/// A process-local in-memory implementation, useful for tests and for
/// development deployments that don't need durability (§6 Persistence).
#[derive(Default)]
pub struct InMemoryStateRepository {
    rows: parking_lot::RwLock<HashMap<(String, String), StateRow>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStateRepository for InMemoryStateRepository {
    async fn save(&self, tenant: &str, row: StateRow) -> Result<(), RepositoryError> {
        self.rows
            .write()
            .insert((tenant.to_string(), row.execution_id.clone()), row);
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant: &str,
        execution_id: &str,
    ) -> Result<Option<StateRow>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .get(&(tenant.to_string(), execution_id.to_string()))
            .cloned())
    }

    async fn find_all(&self, tenant: &str) -> Result<Vec<StateRow>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|r| r.tenant == tenant)
            .cloned()
            .collect())
    }

    async fn find_paused(&self, tenant: &str) -> Result<Vec<StateRow>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|r| r.tenant == tenant && r.is_paused())
            .cloned()
            .collect())
    }

    async fn find_by_workflow_id(
        &self,
        tenant: &str,
        workflow_id: &str,
    ) -> Result<Vec<StateRow>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|r| r.tenant == tenant && r.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, tenant: &str, execution_id: &str) -> Result<(), RepositoryError> {
        self.rows
            .write()
            .remove(&(tenant.to_string(), execution_id.to_string()));
        Ok(())
    }
}

pub const DEFAULT_LEASE_PERIOD_SECS: i64 = 60;

pub fn default_stale_threshold(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(DEFAULT_LEASE_PERIOD_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CheckpointReason, HensuSnapshot};

    fn snapshot(reason: CheckpointReason, current_node: Option<&str>) -> HensuSnapshot {
        HensuSnapshot {
            workflow_id: "wf".into(),
            execution_id: "exec".into(),
            current_node_id: current_node.map(|s| s.to_string()),
            context: Default::default(),
            history: vec![],
            plan_snapshot: None,
            created_at: Utc::now(),
            checkpoint_reason: reason,
        }
    }

    fn row(reason: CheckpointReason, current_node: Option<&str>) -> StateRow {
        StateRow {
            tenant: "t1".into(),
            execution_id: "exec".into(),
            workflow_id: "wf".into(),
            snapshot: snapshot(reason, current_node),
            lease: LeaseColumns {
                server_node_id: None,
                last_heartbeat_at: None,
            },
        }
    }

    #[test]
    fn checkpoint_save_claims_the_row() {
        let mut r = row(CheckpointReason::Checkpoint, Some("A"));
        let now = Utc::now();
        apply_save_lease(&mut r, "node-A", now);
        assert_eq!(r.lease.server_node_id.as_deref(), Some("node-A"));
        assert_eq!(r.lease.last_heartbeat_at, Some(now));
    }

    #[test]
    fn completed_save_clears_lease() {
        let mut r = row(CheckpointReason::Checkpoint, Some("A"));
        apply_save_lease(&mut r, "node-A", Utc::now());
        r.snapshot.checkpoint_reason = CheckpointReason::Completed;
        r.snapshot.current_node_id = None;
        apply_save_lease(&mut r, "node-A", Utc::now());
        assert!(r.lease.server_node_id.is_none());
        assert!(r.lease.last_heartbeat_at.is_none());
    }

    #[test]
    fn paused_rows_have_null_server_node_and_some_current_node() {
        let r = row(CheckpointReason::Paused, Some("review_gate"));
        assert!(r.is_paused());
    }

    #[test]
    fn fresh_heartbeat_is_never_claimed() {
        let now = Utc::now();
        let mut r = row(CheckpointReason::Checkpoint, Some("A"));
        apply_save_lease(&mut r, "node-A", now);
        let threshold = now - Duration::seconds(90);
        let claimed = claim(std::slice::from_mut(&mut r), "node-B", threshold, now);
        assert!(claimed.is_empty());
    }

    #[test]
    fn stale_row_is_claimed_exactly_once() {
        let stale_at = Utc::now() - Duration::seconds(200);
        let mut r = row(CheckpointReason::Checkpoint, Some("A"));
        r.lease.server_node_id = Some("node-A".to_string());
        r.lease.last_heartbeat_at = Some(stale_at);

        let now = Utc::now();
        let threshold = now - Duration::seconds(90);
        let mut rows = vec![r];
        let claimed = claim(&mut rows, "node-B", threshold, now);
        assert_eq!(claimed.len(), 1);
        assert_eq!(rows[0].lease.server_node_id.as_deref(), Some("node-B"));

        let claimed_again = claim(&mut rows, "node-C", threshold, now);
        assert!(claimed_again.is_empty());
    }

    #[test]
    fn heartbeat_tick_is_node_scoped() {
        let now = Utc::now();
        let mut a = row(CheckpointReason::Checkpoint, Some("A"));
        a.lease.server_node_id = Some("node-A".to_string());
        a.lease.last_heartbeat_at = Some(now - Duration::seconds(30));
        let mut b = row(CheckpointReason::Checkpoint, Some("B"));
        b.lease.server_node_id = Some("node-B".to_string());
        let b_heartbeat = now - Duration::seconds(30);
        b.lease.last_heartbeat_at = Some(b_heartbeat);

        let mut rows = vec![a, b];
        heartbeat_tick(&mut rows, "node-A", now);
        assert_eq!(rows[0].lease.last_heartbeat_at, Some(now));
        assert_eq!(rows[1].lease.last_heartbeat_at, Some(b_heartbeat));
    }
}
