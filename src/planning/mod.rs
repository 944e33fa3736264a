//! Planning pipeline (C6, §4.7–§4.10): the agentic node entry point, the
//! `Planner` interface, the step-by-step `PlanExecutor`, and the
//! per-action-kind `StepHandlerRegistry` (C7).

pub mod agentic;
pub mod plan_executor;
pub mod planner;
pub mod step_registry;
