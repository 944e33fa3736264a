//! Error taxonomy (§7).
//!
//! Only FATAL and configuration-time failures are represented as `Err`.
//! FAIL-LOCAL and FAIL-NODE outcomes are encoded as values (`NodeResult`,
//! `StepResult`, `ExecutionResult`) per the propagation rules in the spec.

use thiserror::Error;

/// Errors that abort an entire execution (FATAL, §7) or reject a workflow
/// at construction time (configuration errors, §7).
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// `startNodeId` does not name a node in the workflow.
    #[error("start node '{0}' is not defined in the workflow")]
    UnknownStartNode(String),

    /// A transition rule, fork target, join await-target, or loop body
    /// references a node id that does not exist.
    #[error("node '{0}' references unknown node '{1}'")]
    UnknownNodeReference(String, String),

    /// A node references a rubric id absent from `workflow.rubrics`.
    #[error("node '{0}' references unknown rubric '{1}'")]
    UnknownRubricReference(String, String),

    /// `state.currentNodeId` names a node absent from the workflow graph.
    #[error("execution references missing node '{0}'")]
    MissingNode(String),

    /// No executor is registered for a node's kind.
    #[error("no executor registered for node kind '{0}'")]
    NoExecutorForKind(String),

    /// A Standard node's `agentId` is not present in the agent registry.
    #[error("agent '{0}' is not registered")]
    UnresolvedAgent(String),

    /// An internal invariant was violated (e.g. a planning pipeline
    /// returning no result from either its pre- or execution pipeline).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Rejected at `Workflow::validate()` time.
    #[error("workflow validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors raised by the planning sub-system (§4.8).
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan creation failed: {0}")]
    PlanCreationFailed(String),

    #[error("plan revision failed: {0}")]
    PlanRevisionFailed(String),
}

/// Errors raised by the repository/lease layer (§4.16).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("no such workflow: tenant={tenant}, id={id}")]
    WorkflowNotFound { tenant: String, id: String },

    #[error("no such execution: tenant={tenant}, id={id}")]
    ExecutionNotFound { tenant: String, id: String },

    #[error("cannot delete workflow '{0}': execution state rows still reference it")]
    WorkflowInUse(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
