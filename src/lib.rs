//! Execution kernel for agent-driven workflow pipelines: a graph
//! interpreter (the Workflow Loop), a pre/post processor pipeline around
//! every node, a planning sub-system for agentic steps, and fork/join and
//! parallel-branch concurrency primitives.
//!
//! The kernel owns orchestration only. LLM transports, action bridges,
//! human review UIs, rubric scoring, and durable storage are external
//! collaborators the caller supplies through the traits in [`agent`],
//! [`review_rubric`], and [`repository`].
//!
//! A typical embedder wires up a [`kernel::Kernel`] once, then calls
//! [`kernel::Kernel::execute`] per workflow run and [`kernel::Kernel::resume`]
//! when a run comes back from a PENDING review gate.

pub mod agent;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod kernel;
pub mod listeners;
pub mod model;
pub mod pipeline;
pub mod planning;
pub mod registry;
pub mod repository;
pub mod review_rubric;
pub mod state;
pub mod template;

pub use error::{PlanError, RepositoryError, WorkflowError};
pub use kernel::{ExecutionResult, Kernel, WorkflowProvider};
pub use model::{Node, NodeKind, Workflow};
pub use state::{HensuSnapshot, HensuState, NodeResult, NodeStatus};
