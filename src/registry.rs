//! Node Executor Registry (C2).
//!
//! Dispatch from node kind to executor is an exhaustive `match` in
//! `executor::dispatch` (§9 design note: "prefer the match for
//! performance-critical executors"). This module hosts the one part of
//! dispatch that *is* registry-shaped: `Generic` nodes, whose
//! `executorType` string is resolved to a user-registered handler at
//! runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as Json;

use crate::error::WorkflowError;
use crate::kernel::Kernel;
use crate::state::{HensuState, NodeResult};

/// A user-defined handler for a `Generic` node's `executorType` (§3 `Generic`).
#[async_trait]
pub trait GenericNodeHandler: Send + Sync {
    async fn execute(
        &self,
        config: &Json,
        kernel: &Kernel,
        state: &HensuState,
    ) -> Result<NodeResult, WorkflowError>;
}

/// Safe to mutate at runtime: registration uses an internal lock, reads
/// are lock-free via `parking_lot::RwLock`'s read path (§5 shared-resource
/// policy: "Generic-handler registration is safe during runtime").
#[derive(Default)]
pub struct GenericHandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn GenericNodeHandler>>>,
}

impl GenericHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, executor_type: impl Into<String>, handler: Arc<dyn GenericNodeHandler>) {
        self.handlers.write().insert(executor_type.into(), handler);
    }

    pub fn get(&self, executor_type: &str) -> Option<Arc<dyn GenericNodeHandler>> {
        self.handlers.read().get(executor_type).cloned()
    }
}
