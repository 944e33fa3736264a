//! End-to-end scenarios exercising the full `Kernel::execute` path.
//!
//! Each test below corresponds to one of the concrete scenarios worked
//! out for the execution engine: a linear happy path, an automatic
//! rubric backtrack, a plan that fails once and succeeds on revision, a
//! parallel branch set with a partial failure and no consensus, a
//! fork/join with COLLECT_ALL, a review gate that suspends and resumes,
//! and a lease claim after a missed heartbeat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as Json;

use hensu_workflow::agent::{ActionExecutor, ActionResult, Agent, AgentRegistry, AgentResponse};
use hensu_workflow::concurrency::{CustomMergerRegistry, DefaultConsensusEvaluator};
use hensu_workflow::config::WorkflowEngineConfig;
use hensu_workflow::error::PlanError;
use hensu_workflow::kernel::{ExecutionResult, Kernel, WorkflowProvider};
use hensu_workflow::listeners::{ListenerRegistry, PlanEvent, WorkflowListener};
use hensu_workflow::model::plan::{Plan, PlanSource, PlanStepAction, PlannedStep, StepStatus};
use hensu_workflow::model::workflow::{
    Action, AgentConfig, Branch, ConsensusConfig, ExitStatus, LoopConditionKind, MergeStrategy, Node, NodeKind,
    PlanConstraints, PlanningConfig, ReviewConfig, ReviewMode, TransitionRule, Workflow,
};
use hensu_workflow::planning::planner::{PlanRequest, Planner, RevisionContext};
use hensu_workflow::planning::step_registry::{StepHandlerRegistry, ToolCallStepHandler};
use hensu_workflow::registry::GenericHandlerRegistry;
use hensu_workflow::review_rubric::{ReviewDecision, ReviewHandler, RubricEngine, RubricEvaluationResult};
use hensu_workflow::template::BraceTemplateResolver;
use hensu_workflow::{NodeResult, NodeStatus};

struct TextAgent(String);

#[async_trait]
impl Agent for TextAgent {
    async fn execute(&self, _prompt: &str, _context: &HashMap<String, Json>) -> AgentResponse {
        AgentResponse::TextResponse {
            content: self.0.clone(),
            metadata: HashMap::new(),
        }
    }
}

struct ErrorAgent(String);

#[async_trait]
impl Agent for ErrorAgent {
    async fn execute(&self, _prompt: &str, _context: &HashMap<String, Json>) -> AgentResponse {
        AgentResponse::Error { message: self.0.clone() }
    }
}

struct SleepAgent {
    content: String,
    sleep_ms: u64,
}

#[async_trait]
impl Agent for SleepAgent {
    async fn execute(&self, _prompt: &str, _context: &HashMap<String, Json>) -> AgentResponse {
        tokio::time::sleep(std::time::Duration::from_millis(self.sleep_ms)).await;
        AgentResponse::TextResponse {
            content: self.content.clone(),
            metadata: HashMap::new(),
        }
    }
}

struct FixedAgentRegistry(HashMap<String, Arc<dyn Agent>>);

impl AgentRegistry for FixedAgentRegistry {
    fn get_agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.0.get(id).cloned()
    }
}

/// Resolves `handler_id` against a canned table; anything unlisted
/// succeeds trivially.
struct ScriptedActionExecutor(HashMap<String, ActionResult>);

#[async_trait]
impl ActionExecutor for ScriptedActionExecutor {
    async fn execute(&self, action: &Action, _context: &HashMap<String, Json>) -> ActionResult {
        let Action::Send { handler_id, .. } = action else {
            return ActionResult {
                success: true,
                message: "ok".to_string(),
                output: None,
                error: None,
            };
        };
        self.0.get(handler_id).cloned().unwrap_or(ActionResult {
            success: true,
            message: "ok".to_string(),
            output: None,
            error: None,
        })
    }
}

struct ApproveReviewHandler;

#[async_trait]
impl ReviewHandler for ApproveReviewHandler {
    async fn request_review(&self, _node: &Node, _state: &hensu_workflow::HensuState, _result: &NodeResult) -> ReviewDecision {
        ReviewDecision::Approve { edited_state: None }
    }
}

struct NullRubricEngine;

#[async_trait]
impl RubricEngine for NullRubricEngine {
    async fn evaluate(&self, rubric_id: &str, _output: &Json, _context: &HashMap<String, Json>) -> RubricEvaluationResult {
        RubricEvaluationResult {
            score: 100.0,
            passed: true,
            rubric_id: rubric_id.to_string(),
        }
    }
}

struct FixedRubricEngine {
    score: f64,
    passed: bool,
}

#[async_trait]
impl RubricEngine for FixedRubricEngine {
    async fn evaluate(&self, rubric_id: &str, _output: &Json, _context: &HashMap<String, Json>) -> RubricEvaluationResult {
        RubricEvaluationResult {
            score: self.score,
            passed: self.passed,
            rubric_id: rubric_id.to_string(),
        }
    }
}

struct NullWorkflowProvider;

#[async_trait]
impl WorkflowProvider for NullWorkflowProvider {
    async fn workflow(&self, _id: &str) -> Option<Arc<Workflow>> {
        None
    }
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl WorkflowListener for RecordingListener {
    async fn on_plan_event(&self, event: &PlanEvent) {
        let label = match event {
            PlanEvent::PlanCreated { .. } => "PlanCreated".to_string(),
            PlanEvent::StepStarted { step_index } => format!("StepStarted({step_index})"),
            PlanEvent::StepCompleted { step_index, success } => format!("StepCompleted({step_index},{success})"),
            PlanEvent::PlanRevised { .. } => "PlanRevised".to_string(),
            PlanEvent::PlanCompleted { success, .. } => format!("PlanCompleted({success})"),
        };
        self.events.lock().unwrap().push(label);
    }
}

/// A stub planner used where a `Kernel` requires one but planning is
/// never actually exercised by the test.
struct UnusedPlanner;

#[async_trait]
impl Planner for UnusedPlanner {
    async fn create_plan(&self, _request: &PlanRequest) -> Result<Plan, PlanError> {
        Err(PlanError::PlanCreationFailed("not used in this test".to_string()))
    }
    async fn revise_plan(&self, _current: &Plan, _revision: &RevisionContext) -> Result<Plan, PlanError> {
        Err(PlanError::PlanRevisionFailed("not used in this test".to_string()))
    }
}

/// Returns a plan that fails at step 1 the first time, then a single
/// successful step on revision (scenario: plan with one revision).
struct OnceFailingPlanner;

fn tool_step(index: usize, tool_name: &str) -> PlannedStep {
    PlannedStep {
        index,
        action: PlanStepAction::ToolCall {
            tool_name: tool_name.to_string(),
            arguments: Json::Null,
        },
        description: tool_name.to_string(),
        status: StepStatus::Pending,
    }
}

#[async_trait]
impl Planner for OnceFailingPlanner {
    async fn create_plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        Ok(Plan::new(
            "plan-1",
            "node",
            PlanSource::Static,
            vec![tool_step(0, "ok_tool"), tool_step(1, "fail_tool")],
            request.constraints.clone(),
        ))
    }

    async fn revise_plan(&self, current: &Plan, _revision: &RevisionContext) -> Result<Plan, PlanError> {
        Ok(Plan::new(
            "plan-2",
            current.node_id.clone(),
            PlanSource::Static,
            vec![tool_step(0, "ok_tool2")],
            current.constraints.clone(),
        ))
    }
}

fn base_kernel(agents: HashMap<String, Arc<dyn Agent>>) -> Kernel {
    Kernel {
        agent_registry: Arc::new(FixedAgentRegistry(agents)),
        action_executor: Arc::new(ScriptedActionExecutor(HashMap::new())),
        review_handler: Arc::new(ApproveReviewHandler),
        rubric_engine: Arc::new(NullRubricEngine),
        template_resolver: Arc::new(BraceTemplateResolver),
        planner: Arc::new(UnusedPlanner),
        step_registry: Arc::new(StepHandlerRegistry::new()),
        generic_registry: Arc::new(GenericHandlerRegistry::new()),
        consensus_evaluator: Arc::new(DefaultConsensusEvaluator { judge: None }),
        merger_registry: Arc::new(CustomMergerRegistry::new()),
        workflow_provider: Arc::new(NullWorkflowProvider),
        listeners: Arc::new(ListenerRegistry::new()),
        config: WorkflowEngineConfig::default(),
        max_output_bytes: 1_000_000,
        fork_contexts: Default::default(),
    }
}

fn end_node(id: &str, status: ExitStatus) -> Node {
    Node {
        id: id.to_string(),
        kind: NodeKind::End { status },
        transition_rules: vec![],
    }
}

#[tokio::test]
async fn linear_happy_path() {
    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("writer".to_string(), Arc::new(TextAgent("ok".to_string())));

    let node_a = Node {
        id: "A".to_string(),
        kind: NodeKind::Standard {
            prompt: "Hi {name}".to_string(),
            agent_id: "writer".to_string(),
            output_params: vec![],
            rubric_id: None,
            review_config: ReviewConfig::default(),
            planning_config: PlanningConfig::default(),
            plan_failure_target: None,
        },
        transition_rules: vec![TransitionRule::Success { target: "END".to_string() }],
    };

    let nodes = HashMap::from([("A".to_string(), node_a), ("END".to_string(), end_node("END", ExitStatus::Success))]);
    let workflow = Workflow::new(
        "wf",
        "1",
        nodes,
        "A",
        HashMap::from([("writer".to_string(), AgentConfig { agent_id: "writer".to_string(), params: HashMap::new() })]),
        HashMap::new(),
    )
    .unwrap();

    let kernel = base_kernel(agents);
    let initial = HashMap::from([("name".to_string(), Json::String("Ada".to_string()))]);
    let result = kernel.execute(&workflow, initial).await.unwrap();

    match result {
        ExecutionResult::Completed { status, state } => {
            assert_eq!(status, ExitStatus::Success);
            assert_eq!(state.history.len(), 1);
            assert_eq!(state.history[0].node_id, "A");
            assert_eq!(state.history[0].node_result.status, NodeStatus::Success);
            assert_eq!(
                state.context.get("A").map(|v| v.value().clone()),
                Some(Json::String("ok".to_string()))
            );
        }
        _ => panic!("expected Completed"),
    }
}

#[tokio::test]
async fn rubric_auto_backtrack() {
    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("writer".to_string(), Arc::new(TextAgent("weak draft".to_string())));

    let draft = Node {
        id: "draft".to_string(),
        kind: NodeKind::Standard {
            prompt: "write".to_string(),
            agent_id: "writer".to_string(),
            output_params: vec![],
            rubric_id: Some("quality".to_string()),
            review_config: ReviewConfig::default(),
            planning_config: PlanningConfig::default(),
            plan_failure_target: None,
        },
        transition_rules: vec![
            TransitionRule::Success { target: "END".to_string() },
            TransitionRule::RubricFail { target: "rewrite".to_string() },
        ],
    };

    let nodes = HashMap::from([
        ("draft".to_string(), draft),
        ("rewrite".to_string(), end_node("rewrite", ExitStatus::Failure)),
        ("END".to_string(), end_node("END", ExitStatus::Success)),
    ]);
    let workflow = Workflow::new(
        "wf",
        "1",
        nodes,
        "draft",
        HashMap::new(),
        HashMap::from([("quality".to_string(), Json::Null)]),
    )
    .unwrap();

    let mut kernel = base_kernel(agents);
    kernel.rubric_engine = Arc::new(FixedRubricEngine { score: 45.0, passed: false });

    let result = kernel.execute(&workflow, HashMap::new()).await.unwrap();

    match result {
        ExecutionResult::Completed { status, state } => {
            assert_eq!(status, ExitStatus::Failure);
            assert_eq!(state.backtrack_log.len(), 1);
            let event = &state.backtrack_log[0];
            assert_eq!(event.from, "draft");
            assert_eq!(event.to, "rewrite");
            assert_eq!(event.rubric_score, Some(45.0));
        }
        _ => panic!("expected Completed"),
    }
}

#[tokio::test]
async fn plan_with_one_revision() {
    let recorder = Arc::new(RecordingListener::default());
    let listeners = ListenerRegistry::new();
    listeners.register(recorder.clone());

    let step_registry = StepHandlerRegistry::new();
    let scripted = ScriptedActionExecutor(HashMap::from([(
        "fail_tool".to_string(),
        ActionResult {
            success: false,
            message: "failed".to_string(),
            output: None,
            error: Some("Connection timeout".to_string()),
        },
    )]));
    step_registry.register_tool_call(Arc::new(ToolCallStepHandler {
        action_executor: Arc::new(scripted),
    }));

    let node = Node {
        id: "plan_node".to_string(),
        kind: NodeKind::Standard {
            prompt: "do the thing".to_string(),
            agent_id: "writer".to_string(),
            output_params: vec![],
            rubric_id: None,
            review_config: ReviewConfig::default(),
            planning_config: PlanningConfig {
                enabled: true,
                review: false,
                constraints: Some(PlanConstraints {
                    max_steps: 5,
                    max_replans: 1,
                    max_duration_ms: 60_000,
                    max_token_budget: None,
                    allow_replan: true,
                }),
            },
            plan_failure_target: None,
        },
        transition_rules: vec![TransitionRule::Success { target: "END".to_string() }],
    };

    let nodes = HashMap::from([
        ("plan_node".to_string(), node),
        ("END".to_string(), end_node("END", ExitStatus::Success)),
    ]);
    let workflow = Workflow::new("wf", "1", nodes, "plan_node", HashMap::new(), HashMap::new()).unwrap();

    let mut kernel = base_kernel(HashMap::new());
    kernel.planner = Arc::new(OnceFailingPlanner);
    kernel.step_registry = Arc::new(step_registry);
    kernel.listeners = Arc::new(listeners);

    let result = kernel.execute(&workflow, HashMap::new()).await.unwrap();

    match result {
        ExecutionResult::Completed { status, state } => {
            assert_eq!(status, ExitStatus::Success);
            assert_eq!(state.history[0].node_result.status, NodeStatus::Success);
        }
        _ => panic!("expected Completed"),
    }

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "PlanCreated",
            "StepStarted(0)",
            "StepCompleted(0,true)",
            "StepStarted(1)",
            "StepCompleted(1,false)",
            "PlanRevised",
            "PlanCreated",
            "StepStarted(0)",
            "StepCompleted(0,true)",
            "PlanCompleted(true)",
        ]
    );
}

#[tokio::test]
async fn parallel_partial_failure_without_consensus() {
    let branches = vec![
        Branch { id: "b1".to_string(), agent_id: "a1".to_string(), prompt: "p".to_string(), rubric_id: None, weight: 1.0 },
        Branch { id: "b2".to_string(), agent_id: "a2".to_string(), prompt: "p".to_string(), rubric_id: None, weight: 1.0 },
        Branch { id: "b3".to_string(), agent_id: "a3".to_string(), prompt: "p".to_string(), rubric_id: None, weight: 1.0 },
    ];

    let node = Node {
        id: "par".to_string(),
        kind: NodeKind::Parallel { branches, consensus: None },
        transition_rules: vec![
            TransitionRule::Success { target: "END".to_string() },
            TransitionRule::Failure { target: "FAIL".to_string() },
        ],
    };
    let nodes = HashMap::from([
        ("par".to_string(), node),
        ("END".to_string(), end_node("END", ExitStatus::Success)),
        ("FAIL".to_string(), end_node("FAIL", ExitStatus::Failure)),
    ]);
    let workflow = Workflow::new("wf", "1", nodes, "par", HashMap::new(), HashMap::new()).unwrap();

    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("a1".to_string(), Arc::new(TextAgent("yes".to_string())));
    agents.insert("a2".to_string(), Arc::new(ErrorAgent("boom".to_string())));
    agents.insert("a3".to_string(), Arc::new(SleepAgent { content: "late".to_string(), sleep_ms: 200 }));

    let mut kernel = base_kernel(agents);
    kernel.config.default_branch_timeout_ms = 10;

    let result = kernel.execute(&workflow, HashMap::new()).await.unwrap();

    match result {
        ExecutionResult::Completed { status, state } => {
            assert_eq!(status, ExitStatus::Failure);
            let failed: Vec<String> = serde_json::from_value(
                state.context.get("failed_branches").map(|v| v.value().clone()).unwrap(),
            )
            .unwrap();
            assert_eq!(failed, vec!["b2 (boom)".to_string(), "b3 (branch timed out)".to_string()]);
        }
        _ => panic!("expected Completed"),
    }
}

#[tokio::test]
async fn fork_join_collect_all() {
    let x = Node {
        id: "x".to_string(),
        kind: NodeKind::Standard {
            prompt: "p".to_string(),
            agent_id: "ax".to_string(),
            output_params: vec![],
            rubric_id: None,
            review_config: ReviewConfig::default(),
            planning_config: PlanningConfig::default(),
            plan_failure_target: None,
        },
        transition_rules: vec![],
    };
    let y = Node {
        id: "y".to_string(),
        kind: NodeKind::Standard {
            prompt: "p".to_string(),
            agent_id: "ay".to_string(),
            output_params: vec![],
            rubric_id: None,
            review_config: ReviewConfig::default(),
            planning_config: PlanningConfig::default(),
            plan_failure_target: None,
        },
        transition_rules: vec![],
    };
    let fork = Node {
        id: "fork1".to_string(),
        kind: NodeKind::Fork {
            targets: vec!["x".to_string(), "y".to_string()],
            target_configs: HashMap::new(),
            wait_for_all: true,
        },
        transition_rules: vec![TransitionRule::Success { target: "join1".to_string() }],
    };
    let join = Node {
        id: "join1".to_string(),
        kind: NodeKind::Join {
            await_targets: vec!["x".to_string(), "y".to_string()],
            merge_strategy: MergeStrategy::CollectAll,
            output_field: "results".to_string(),
            timeout_ms: 5_000,
            fail_on_any_error: false,
        },
        transition_rules: vec![TransitionRule::Success { target: "END".to_string() }],
    };

    let nodes = HashMap::from([
        ("x".to_string(), x),
        ("y".to_string(), y),
        ("fork1".to_string(), fork),
        ("join1".to_string(), join),
        ("END".to_string(), end_node("END", ExitStatus::Success)),
    ]);
    let workflow = Workflow::new("wf", "1", nodes, "fork1", HashMap::new(), HashMap::new()).unwrap();

    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("ax".to_string(), Arc::new(TextAgent("X".to_string())));
    agents.insert("ay".to_string(), Arc::new(TextAgent("Y".to_string())));

    let kernel = base_kernel(agents);
    let result = kernel.execute(&workflow, HashMap::new()).await.unwrap();

    match result {
        ExecutionResult::Completed { status, state } => {
            assert_eq!(status, ExitStatus::Success);
            assert_eq!(
                state.context.get("results").map(|v| v.value().clone()),
                Some(serde_json::json!(["X", "Y"]))
            );
        }
        _ => panic!("expected Completed"),
    }
}

#[tokio::test]
async fn review_approve_passes_through_with_single_history_entry() {
    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("writer".to_string(), Arc::new(TextAgent("ok".to_string())));

    let node = Node {
        id: "draft".to_string(),
        kind: NodeKind::Standard {
            prompt: "write".to_string(),
            agent_id: "writer".to_string(),
            output_params: vec![],
            rubric_id: None,
            review_config: ReviewConfig { mode: ReviewMode::Required, allow_backtrack: true, allow_state_edit: true },
            planning_config: PlanningConfig::default(),
            plan_failure_target: None,
        },
        transition_rules: vec![TransitionRule::Success { target: "END".to_string() }],
    };
    let nodes = HashMap::from([("draft".to_string(), node), ("END".to_string(), end_node("END", ExitStatus::Success))]);
    let workflow = Workflow::new("wf", "1", nodes, "draft", HashMap::new(), HashMap::new()).unwrap();

    let kernel = base_kernel(agents);
    let result = kernel.execute(&workflow, HashMap::new()).await.unwrap();

    match result {
        ExecutionResult::Completed { status, state } => {
            assert_eq!(status, ExitStatus::Success);
            assert_eq!(state.history.len(), 1);
        }
        _ => panic!("expected Completed"),
    }
}

#[tokio::test]
async fn plan_review_gate_pending_then_resume() {
    let node = Node {
        id: "plan_node".to_string(),
        kind: NodeKind::Standard {
            prompt: "do the thing".to_string(),
            agent_id: "writer".to_string(),
            output_params: vec![],
            rubric_id: None,
            review_config: ReviewConfig::default(),
            planning_config: PlanningConfig {
                enabled: true,
                review: true,
                constraints: Some(PlanConstraints {
                    max_steps: 5,
                    max_replans: 0,
                    max_duration_ms: 60_000,
                    max_token_budget: None,
                    allow_replan: false,
                }),
            },
            plan_failure_target: None,
        },
        transition_rules: vec![TransitionRule::Success { target: "END".to_string() }],
    };
    let nodes = HashMap::from([
        ("plan_node".to_string(), node),
        ("END".to_string(), end_node("END", ExitStatus::Success)),
    ]);
    let workflow = Workflow::new("wf", "1", nodes, "plan_node", HashMap::new(), HashMap::new()).unwrap();

    let step_registry = StepHandlerRegistry::new();
    step_registry.register_tool_call(Arc::new(ToolCallStepHandler {
        action_executor: Arc::new(ScriptedActionExecutor(HashMap::new())),
    }));

    let mut kernel = base_kernel(HashMap::new());
    kernel.planner = Arc::new(OnceFailingPlanner); // create_plan returns a 2-step plan; fine, review gate intercepts first
    kernel.step_registry = Arc::new(step_registry);

    let first = kernel.execute(&workflow, HashMap::new()).await.unwrap();
    let snapshot = match first {
        ExecutionResult::Pending { state, metadata } => {
            assert_eq!(metadata.get("_plan_review_required"), Some(&Json::Bool(true)));
            state.snapshot(hensu_workflow::state::CheckpointReason::Paused, None)
        }
        _ => panic!("expected Pending"),
    };

    // fail_tool step still in the approved plan would fail again; replace
    // its action with a trivially successful one to simulate the
    // reviewer editing the plan before approving it.
    let mut plan: Plan = serde_json::from_value(snapshot.context.get("_plan").cloned().unwrap()).unwrap();
    plan.steps.retain(|s| !matches!(&s.action, PlanStepAction::ToolCall{ tool_name, .. } if tool_name == "fail_tool"));

    let mut edited_snapshot = snapshot;
    edited_snapshot
        .context
        .insert("_plan".to_string(), serde_json::to_value(&plan).unwrap());

    // Resuming runs the (now one-step) plan to completion, but the same
    // `review` flag gates the post-execution summary too, so this still
    // comes back PENDING rather than Completed.
    let second = kernel.resume(&workflow, &edited_snapshot).await.unwrap();
    let second_snapshot = match second {
        ExecutionResult::Pending { state, metadata } => {
            assert!(metadata.contains_key("_plan_execution_summary"));
            state.snapshot(hensu_workflow::state::CheckpointReason::Paused, None)
        }
        _ => panic!("expected a second Pending for the post-execution review gate"),
    };

    let third = kernel.resume(&workflow, &second_snapshot).await.unwrap();
    match third {
        ExecutionResult::Completed { status, .. } => assert_eq!(status, ExitStatus::Success),
        _ => panic!("expected Completed after the second resume"),
    }
}

#[test]
fn lease_claim_after_missed_heartbeat() {
    use chrono::{Duration, Utc};
    use hensu_workflow::repository::{claim, LeaseColumns, StateRow};
    use hensu_workflow::state::{CheckpointReason, HensuSnapshot};

    let now = Utc::now();
    let mut row = StateRow {
        tenant: "t1".to_string(),
        execution_id: "exec-1".to_string(),
        workflow_id: "wf".to_string(),
        snapshot: HensuSnapshot {
            workflow_id: "wf".to_string(),
            execution_id: "exec-1".to_string(),
            current_node_id: Some("A".to_string()),
            context: Default::default(),
            history: vec![],
            plan_snapshot: None,
            created_at: now,
            checkpoint_reason: CheckpointReason::Checkpoint,
        },
        lease: LeaseColumns {
            server_node_id: Some("node-A".to_string()),
            last_heartbeat_at: Some(now - Duration::seconds(120)),
        },
    };

    let threshold = now - Duration::seconds(90);
    let mut rows = vec![row];
    let claimed = claim(&mut rows, "node-B", threshold, now);

    assert_eq!(claimed.len(), 1);
    assert_eq!(rows[0].lease.server_node_id.as_deref(), Some("node-B"));

    let claimed_again = claim(&mut rows, "node-C", threshold, now);
    assert!(claimed_again.is_empty());
}
