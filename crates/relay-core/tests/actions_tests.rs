use async_trait::async_trait;
use relay_core::handoff::DEFAULT_HANDOFF_NOTES;
use relay_core::{
    ActionArgs, ActionContext, ActionHandler, ActionOutcome, DatabaseManager, Dispatcher,
    HandoffManager, JinjaTemplateEngine, Session, SessionLookup, SessionManager, SessionStatus,
    WorkflowState,
};
use relay_local_db::TABLE_WORKFLOW_HANDOFFS;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};
use tempfile::TempDir;

struct Harness {
    db: DatabaseManager,
    sessions: SessionManager,
    handoffs: HandoffManager,
    templates: JinjaTemplateEngine,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new() -> Self {
        let db = DatabaseManager::in_memory().unwrap();
        Self {
            sessions: db.sessions(),
            handoffs: db.handoffs(),
            templates: JinjaTemplateEngine::new(),
            dispatcher: Dispatcher::with_builtin_actions(),
            db,
        }
    }

    async fn run(&self, state: &mut WorkflowState, action: &str, args: Value) -> Option<ActionOutcome> {
        let mut ctx = ActionContext::new(state, &self.handoffs, &self.sessions, &self.templates);
        self.dispatcher.execute(action, &mut ctx, args).await
    }

    async fn run_in(
        &self,
        dir: &Path,
        state: &mut WorkflowState,
        action: &str,
        args: Value,
    ) -> Option<ActionOutcome> {
        let mut ctx = ActionContext::new(state, &self.handoffs, &self.sessions, &self.templates)
            .with_working_dir(dir);
        self.dispatcher.execute(action, &mut ctx, args).await
    }

    fn handoff_rows(&self) -> i64 {
        let conn = self.db.database().connection().lock().unwrap();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", TABLE_WORKFLOW_HANDOFFS),
            [],
            |row| row.get(0),
        )
        .unwrap()
    }
}

struct FailingAction;

#[async_trait]
impl ActionHandler for FailingAction {
    async fn execute(
        &self,
        _ctx: &mut ActionContext<'_>,
        _args: ActionArgs,
    ) -> relay_core::Result<Option<ActionOutcome>> {
        Err(relay_core::Error::generic("disk on fire"))
    }
}

struct PanickingAction;

#[async_trait]
impl ActionHandler for PanickingAction {
    async fn execute(
        &self,
        _ctx: &mut ActionContext<'_>,
        _args: ActionArgs,
    ) -> relay_core::Result<Option<ActionOutcome>> {
        panic!("kaboom")
    }
}

struct EchoAction(&'static str);

#[async_trait]
impl ActionHandler for EchoAction {
    async fn execute(
        &self,
        _ctx: &mut ActionContext<'_>,
        args: ActionArgs,
    ) -> relay_core::Result<Option<ActionOutcome>> {
        match args {
            ActionArgs::Custom(raw) => Ok(Some(ActionOutcome::InjectMessage(format!(
                "{}:{}",
                self.0, raw
            )))),
            other => Err(relay_core::Error::argument(format!("unexpected {:?}", other))),
        }
    }
}

/// Session collaborator that is not backed by the relay database.
struct RecordingSessions {
    session: Session,
    status_updates: Mutex<Vec<(String, SessionStatus)>>,
}

impl RecordingSessions {
    fn new(session: Session) -> Self {
        Self {
            session,
            status_updates: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionLookup for RecordingSessions {
    async fn get(&self, session_id: &str) -> relay_core::Result<Option<Session>> {
        Ok((session_id == self.session.id).then(|| self.session.clone()))
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> relay_core::Result<()> {
        self.status_updates
            .lock()
            .unwrap()
            .push((session_id.to_string(), status));
        Ok(())
    }
}

#[tokio::test]
async fn test_unknown_action_returns_none() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness.run(&mut state, "does_not_exist", json!({})).await;
    assert!(outcome.is_none());
    assert_eq!(state.phase_action_count, 0);
}

#[tokio::test]
async fn test_handler_error_becomes_error_outcome() {
    let mut harness = Harness::new();
    harness.dispatcher.register("explode", Arc::new(FailingAction));
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness.run(&mut state, "explode", json!({})).await;
    match outcome {
        Some(ActionOutcome::Error(message)) => assert!(message.contains("disk on fire")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(state.phase_action_count, 1);
}

#[tokio::test]
async fn test_handler_panic_becomes_error_outcome() {
    let mut harness = Harness::new();
    harness.dispatcher.register("panic", Arc::new(PanickingAction));
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness.run(&mut state, "panic", Value::Null).await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::Error("action panicked: kaboom".to_string()))
    );
}

#[tokio::test]
async fn test_last_registration_wins() {
    let mut harness = Harness::new();
    harness.dispatcher.register("echo", Arc::new(EchoAction("first")));
    harness.dispatcher.register("echo", Arc::new(EchoAction("second")));
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness.run(&mut state, "echo", json!({"x": 1})).await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::InjectMessage("second:{\"x\":1}".to_string()))
    );
}

#[tokio::test]
async fn test_bad_arguments_become_argument_error() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness
        .run(&mut state, "inject_context", json!({"source": "nowhere"}))
        .await;
    assert!(matches!(outcome, Some(ActionOutcome::ArgumentError(_))));

    let outcome = harness.run(&mut state, "capture_artifact", json!({})).await;
    assert!(matches!(outcome, Some(ActionOutcome::ArgumentError(_))));
    assert_eq!(state.phase_action_count, 0);
}

#[tokio::test]
async fn test_inject_context_without_parent_returns_none() {
    let harness = Harness::new();
    let session = harness.sessions.register("proj", None).unwrap();
    let mut state = WorkflowState::new(&session.id, "wf", "plan");

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({"source": "previous_session_summary"}),
        )
        .await;
    assert!(outcome.is_none());
    assert!(!state.context_injected);
}

#[tokio::test]
async fn test_inject_context_for_unknown_session_returns_none() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("ghost", "wf", "plan");

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({"source": "previous_session_summary"}),
        )
        .await;
    assert!(outcome.is_none());
    assert!(!state.context_injected);
}

#[tokio::test]
async fn test_inject_context_uses_parent_summary() {
    let harness = Harness::new();
    let parent = harness.sessions.register("proj", None).unwrap();
    harness.sessions.update_summary(&parent.id, "S").unwrap();
    let child = harness.sessions.register("proj", Some(&parent.id)).unwrap();
    let mut state = WorkflowState::new(&child.id, "wf", "plan");

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({"source": "previous_session_summary"}),
        )
        .await;
    assert_eq!(outcome, Some(ActionOutcome::InjectContext("S".to_string())));
    assert!(state.context_injected);
}

#[tokio::test]
async fn test_inject_context_with_empty_parent_summary_returns_none() {
    let harness = Harness::new();
    let parent = harness.sessions.register("proj", None).unwrap();
    let child = harness.sessions.register("proj", Some(&parent.id)).unwrap();
    let mut state = WorkflowState::new(&child.id, "wf", "plan");

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({"source": "previous_session_summary", "template": "Before: {{ summary }}"}),
        )
        .await;
    assert!(outcome.is_none());
    assert!(!state.context_injected);
}

#[tokio::test]
async fn test_inject_context_keeps_whitespace_only_summary() {
    let harness = Harness::new();
    let parent = harness.sessions.register("proj", None).unwrap();
    harness.sessions.update_summary(&parent.id, "  ").unwrap();
    let child = harness.sessions.register("proj", Some(&parent.id)).unwrap();
    let mut state = WorkflowState::new(&child.id, "wf", "plan");

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({"source": "previous_session_summary"}),
        )
        .await;
    assert_eq!(outcome, Some(ActionOutcome::InjectContext("  ".to_string())));
    assert!(state.context_injected);
}

#[tokio::test]
async fn test_inject_context_renders_template() {
    let harness = Harness::new();
    let parent = harness.sessions.register("proj", None).unwrap();
    harness
        .sessions
        .update_summary(&parent.id, "Wrote the parser")
        .unwrap();
    let child = harness.sessions.register("proj", Some(&parent.id)).unwrap();
    let mut state = WorkflowState::new(&child.id, "wf", "plan");

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({
                "source": "previous_session_summary",
                "template": "[{{ state.phase }}] {{ summary }} ({{ session.project_id }})",
            }),
        )
        .await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::InjectContext(
            "[plan] Wrote the parser (proj)".to_string()
        ))
    );
}

#[tokio::test]
async fn test_inject_context_reads_claimed_handoff_only() {
    let harness = Harness::new();
    let from = harness.sessions.register("proj", None).unwrap();
    let next = harness.sessions.register("proj", None).unwrap();

    let mut from_state = WorkflowState::new(&from.id, "wf", "execute");
    harness
        .run(&mut from_state, "generate_handoff", json!({}))
        .await;

    // Open but unclaimed: nothing to inject.
    let mut state = WorkflowState::new(&next.id, "wf", "plan");
    let outcome = harness
        .run(&mut state, "inject_context", json!({"source": "handoff"}))
        .await;
    assert!(outcome.is_none());
    assert_eq!(harness.handoffs.list_open("proj").unwrap().len(), 1);

    harness.handoffs.claim(&next.id, "proj", Some("wf")).unwrap().unwrap();
    let outcome = harness
        .run(&mut state, "inject_context", json!({"source": "handoff"}))
        .await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::InjectContext(format!(
            "Handoff Notes: {}\n",
            DEFAULT_HANDOFF_NOTES
        )))
    );
    assert!(state.context_injected);

    let outcome = harness
        .run(
            &mut state,
            "inject_context",
            json!({"source": "handoff", "template": "From {{ handoff.from_session_id }}"}),
        )
        .await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::InjectContext(format!("From {}", from.id)))
    );
}

#[tokio::test]
async fn test_inject_message_passes_plain_text_through() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("no-such-session", "wf", "plan");

    let outcome = harness
        .run(&mut state, "inject_message", json!({"content": "Keep going."}))
        .await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::InjectMessage("Keep going.".to_string()))
    );
    assert!(!state.context_injected);
}

#[tokio::test]
async fn test_inject_message_extra_keys_shadow_builtins() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("s1", "wf", "plan");
    state.set_variable("ticket", json!("REL-7"));

    let outcome = harness
        .run(
            &mut state,
            "inject_message",
            json!({
                "content": "{{ phase_action_count }} {{ variables.ticket }} {{ state }}",
                "state": "overridden",
            }),
        )
        .await;
    assert_eq!(
        outcome,
        Some(ActionOutcome::InjectMessage("1 REL-7 overridden".to_string()))
    );
}

#[tokio::test]
async fn test_undefined_template_variable_is_error_outcome() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness
        .run(&mut state, "inject_message", json!({"content": "Hi {{ nobody }}"}))
        .await;
    match outcome {
        Some(ActionOutcome::Error(message)) => assert!(message.starts_with("Template render error")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_capture_artifact_with_name() {
    let harness = Harness::new();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("plan.md"), "# Plan").unwrap();
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness
        .run_in(
            dir.path(),
            &mut state,
            "capture_artifact",
            json!({"pattern": "*.md", "as": "plan"}),
        )
        .await;

    let expected = dir.path().join("plan.md");
    assert_eq!(outcome, Some(ActionOutcome::Captured(expected.clone())));
    assert_eq!(state.artifacts["plan"], expected.to_string_lossy());
}

#[tokio::test]
async fn test_capture_artifact_without_name_leaves_artifacts() {
    let harness = Harness::new();
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out").join("report.txt"), "ok").unwrap();
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness
        .run_in(
            dir.path(),
            &mut state,
            "capture_artifact",
            json!({"pattern": "**/report.txt"}),
        )
        .await;

    let Some(ActionOutcome::Captured(path)) = outcome else {
        panic!("expected a capture, got {:?}", outcome);
    };
    assert!(path.is_absolute());
    assert!(path.ends_with("out/report.txt"));
    assert!(state.artifacts.is_empty());
}

#[tokio::test]
async fn test_capture_artifact_no_match_returns_none() {
    let harness = Harness::new();
    let dir = TempDir::new().unwrap();
    let mut state = WorkflowState::new("s1", "wf", "plan");

    let outcome = harness
        .run_in(
            dir.path(),
            &mut state,
            "capture_artifact",
            json!({"pattern": "*.md", "as": "plan"}),
        )
        .await;
    assert!(outcome.is_none());
    assert!(state.artifacts.is_empty());
}

#[tokio::test]
async fn test_generate_handoff_with_artifacts() {
    let harness = Harness::new();
    let session = harness.sessions.register("proj", None).unwrap();
    let mut state = WorkflowState::new(&session.id, "plan-execute", "execute");
    state.set_artifact("plan", "/work/plan.md");

    let outcome = harness
        .run(&mut state, "generate_handoff", json!({"include": ["artifacts"]}))
        .await;
    assert_eq!(outcome, Some(ActionOutcome::HandoffCreated(true)));
    assert_eq!(harness.handoff_rows(), 1);

    let published = harness.handoffs.list_from_session(&session.id).unwrap();
    assert_eq!(published.len(), 1);
    let handoff = &published[0];
    assert_eq!(handoff.from_session_id, session.id);
    assert_eq!(handoff.project_id, "proj");
    assert_eq!(handoff.workflow_name, "plan-execute");
    assert_eq!(handoff.phase, "execute");
    assert_eq!(handoff.artifacts["plan"], "/work/plan.md");
    assert!(handoff.pending_tasks.is_empty());
    assert_eq!(handoff.notes.as_deref(), Some(DEFAULT_HANDOFF_NOTES));
    assert!(handoff.is_open());

    let session = harness.sessions.find(&session.id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::HandoffReady);
}

#[tokio::test]
async fn test_generate_handoff_without_include_and_no_dedup() {
    let harness = Harness::new();
    let session = harness.sessions.register("proj", None).unwrap();
    let mut state = WorkflowState::new(&session.id, "wf", "execute");
    state.set_artifact("plan", "/work/plan.md");

    let outcome = harness.run(&mut state, "generate_handoff", Value::Null).await;
    assert_eq!(outcome, Some(ActionOutcome::HandoffCreated(true)));
    let outcome = harness
        .run(&mut state, "generate_handoff", json!({"include": []}))
        .await;
    assert_eq!(outcome, Some(ActionOutcome::HandoffCreated(true)));

    let published = harness.handoffs.list_from_session(&session.id).unwrap();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|h| h.artifacts.is_empty()));
}

#[tokio::test]
async fn test_generate_handoff_marks_ready_through_session_collaborator() {
    let harness = Harness::new();
    let sessions = RecordingSessions::new(Session::new(
        "s-external".to_string(),
        "proj".to_string(),
        None,
    ));
    let mut state = WorkflowState::new("s-external", "wf", "execute");

    let outcome = {
        let mut ctx =
            ActionContext::new(&mut state, &harness.handoffs, &sessions, &harness.templates);
        harness
            .dispatcher
            .execute("generate_handoff", &mut ctx, json!({}))
            .await
    };
    assert_eq!(outcome, Some(ActionOutcome::HandoffCreated(true)));

    let updates = sessions.status_updates.lock().unwrap().clone();
    assert_eq!(
        updates,
        vec![("s-external".to_string(), SessionStatus::HandoffReady)]
    );
    assert_eq!(harness.handoff_rows(), 1);
    assert_eq!(harness.handoffs.list_open("proj").unwrap().len(), 1);
}

#[tokio::test]
async fn test_generate_handoff_for_unknown_session_returns_none() {
    let harness = Harness::new();
    let mut state = WorkflowState::new("ghost", "wf", "execute");

    let outcome = harness.run(&mut state, "generate_handoff", json!({})).await;
    assert!(outcome.is_none());
    assert_eq!(harness.handoff_rows(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_one_winner() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("state.db");

    let setup = DatabaseManager::with_path(&db_path).unwrap();
    let from = setup.sessions().register("proj", None).unwrap();
    let mut state = WorkflowState::new(&from.id, "wf", "execute");
    {
        let sessions = setup.sessions();
        let handoffs = setup.handoffs();
        let templates = JinjaTemplateEngine::new();
        let mut ctx = ActionContext::new(&mut state, &handoffs, &sessions, &templates);
        let outcome = Dispatcher::with_builtin_actions()
            .execute("generate_handoff", &mut ctx, json!({}))
            .await;
        assert_eq!(outcome, Some(ActionOutcome::HandoffCreated(true)));
    }

    let claimers = 6;
    let barrier = Arc::new(Barrier::new(claimers));
    let mut tasks = Vec::new();
    for i in 0..claimers {
        let handoffs = DatabaseManager::with_path(&db_path).unwrap().handoffs();
        let barrier = barrier.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let session_id = format!("claimer-{}", i);
            barrier.wait();
            let claimed = handoffs.claim(&session_id, "proj", Some("wf")).unwrap();
            (session_id, claimed)
        }));
    }

    let mut winners = Vec::new();
    for task in tasks {
        let (session_id, claimed) = task.await.unwrap();
        if let Some(handoff) = claimed {
            assert_eq!(handoff.consumed_by_session.as_deref(), Some(session_id.as_str()));
            winners.push(session_id);
        }
    }
    assert_eq!(winners.len(), 1);

    let handoffs = setup.handoffs();
    assert!(handoffs.list_open("proj").unwrap().is_empty());
    let stored = handoffs.find_claimed_by(&winners[0]).unwrap().unwrap();
    assert_eq!(stored.consumed_by_session.as_deref(), Some(winners[0].as_str()));
}

#[test]
fn test_outcome_json_shapes() {
    let cases = [
        (ActionOutcome::InjectContext("S".into()), json!({"inject_context": "S"})),
        (ActionOutcome::InjectMessage("hi".into()), json!({"inject_message": "hi"})),
        (
            ActionOutcome::Captured("/work/plan.md".into()),
            json!({"captured": "/work/plan.md"}),
        ),
        (ActionOutcome::HandoffCreated(true), json!({"handoff_created": true})),
        (ActionOutcome::Error("boom".into()), json!({"error": "boom"})),
        (
            ActionOutcome::ArgumentError("bad".into()),
            json!({"argument_error": "bad"}),
        ),
    ];
    for (outcome, expected) in cases {
        let failed = expected.get("error").is_some() || expected.get("argument_error").is_some();
        assert_eq!(outcome.is_error(), failed);
        assert_eq!(serde_json::to_value(&outcome).unwrap(), expected);
    }
}
