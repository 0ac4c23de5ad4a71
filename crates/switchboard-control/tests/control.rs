use async_trait::async_trait;
use std::sync::Arc;
use switchboard_control::{
    ActiveRuns, ControlConfig, ControlMessage, ControlOutcome, ControlPlane,
};
use switchboard_followup::{FollowupItem, FollowupQueues, QueueSettings, RunContext};
use switchboard_sessions::{
    MemorySessionStore, MemorySubagentRegistry, SessionEntry, SessionKey, SessionMutation,
    SessionStore, SessionStoreError, SessionStoreResult, SubagentRun,
};

const MINUTE_MS: u64 = 60 * 1_000;
const NOW_MS: u64 = 10_000 * MINUTE_MS;

struct Harness {
    plane: ControlPlane,
    store: MemorySessionStore,
    registry: MemorySubagentRegistry,
    runs: ActiveRuns,
}

impl Harness {
    fn new(entries: Vec<(&str, SessionEntry)>) -> Self {
        let store = MemorySessionStore::with_entries(entries);
        let registry = MemorySubagentRegistry::new();
        let runs = ActiveRuns::new();
        let plane = ControlPlane::new(
            FollowupQueues::default(),
            Arc::new(store.clone()),
            Arc::new(registry.clone()),
            Arc::new(runs.clone()),
            ControlConfig::default(),
        )
        .expect("control plane should build");
        Self {
            plane,
            store,
            registry,
            runs,
        }
    }

    fn enqueue(&self, session_key: &str, prompt: &str) {
        self.plane
            .queues()
            .enqueue(
                session_key,
                FollowupItem::new(prompt, RunContext::new("s-any", session_key)),
                &QueueSettings::default(),
            )
            .expect("enqueue should succeed");
    }

    async fn handle(&self, message: ControlMessage) -> ControlOutcome {
        self.plane
            .handle_inbound_control_message_at(&message, NOW_MS)
            .await
            .expect("control message should be handled")
    }

    async fn entry(&self, session_key: &str) -> SessionEntry {
        self.store
            .get(session_key)
            .await
            .expect("store read should succeed")
            .expect("entry should exist")
    }
}

fn child_run(run_id: &str, requester: &str, child: &str) -> SubagentRun {
    SubagentRun {
        run_id: run_id.to_string(),
        requester_session_key: requester.to_string(),
        child_session_key: child.to_string(),
        created_at_ms: NOW_MS,
        ended_at_ms: None,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn stop_twice_expected_second_call_idempotent() {
    let harness = Harness::new(vec![
        ("agent:main:main", SessionEntry::new("s-main", NOW_MS - MINUTE_MS)),
        ("agent:main:child", SessionEntry::new("s-child", NOW_MS)),
    ]);
    harness
        .registry
        .register(child_run("r1", "agent:main:main", "agent:main:child"));
    let main_run = harness.runs.register("s-main");
    harness.runs.register("s-child");
    harness.enqueue("agent:main:main", "queued while busy");

    let first = harness
        .handle(ControlMessage::new("agent:main:main", "[Discord] @bot stop"))
        .await;
    assert_eq!(
        first,
        ControlOutcome {
            handled: true,
            aborted: true,
            stopped_subagents: 1,
        }
    );
    assert!(main_run.is_abort_requested());
    assert!(!harness.plane.queues().is_active("agent:main:main"));
    let entry = harness.entry("agent:main:main").await;
    assert!(entry.aborted_last_run);
    assert_eq!(entry.updated_at_ms, NOW_MS);

    let second = harness
        .handle(ControlMessage::new("agent:main:main", "stop"))
        .await;
    assert_eq!(
        second,
        ControlOutcome {
            handled: true,
            aborted: false,
            stopped_subagents: 0,
        }
    );
}

#[tokio::test(flavor = "current_thread")]
async fn stop_all_expected_only_recent_same_agent_sessions() {
    let harness = Harness::new(vec![
        ("agent:main:main", SessionEntry::new("s-main", NOW_MS)),
        ("agent:main:sub1", SessionEntry::new("s-sub1", NOW_MS - 5 * MINUTE_MS)),
        ("agent:other:main", SessionEntry::new("s-other", NOW_MS - MINUTE_MS)),
    ]);
    for session_id in ["s-main", "s-sub1", "s-other"] {
        harness.runs.register(session_id);
    }

    let outcome = harness
        .handle(ControlMessage::new("agent:main:main", "stop all"))
        .await;

    assert!(outcome.handled);
    assert!(outcome.aborted);
    assert_eq!(outcome.stopped_subagents, 1);
    assert!(!harness.runs.is_active("s-sub1"));
    assert!(harness.runs.is_active("s-other"));
    assert!(!harness.entry("agent:other:main").await.aborted_last_run);
    assert!(!harness.entry("agent:main:sub1").await.aborted_last_run);
}

#[tokio::test(flavor = "current_thread")]
async fn stop_all_subagent_also_in_agent_scope_expected_counted_once() {
    let harness = Harness::new(vec![
        ("agent:main:main", SessionEntry::new("s-main", NOW_MS)),
        ("agent:main:sub1", SessionEntry::new("s-sub1", NOW_MS)),
    ]);
    harness
        .registry
        .register(child_run("r1", "agent:main:main", "agent:main:sub1"));
    harness.runs.register("s-sub1");

    let outcome = harness
        .handle(ControlMessage::new("agent:main:main", "/stop all"))
        .await;

    assert_eq!(outcome.stopped_subagents, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn unauthorized_or_plain_message_expected_not_handled() {
    let harness = Harness::new(vec![("agent:main:main", SessionEntry::new("s-main", NOW_MS))]);
    harness.runs.register("s-main");

    let unauthorized = harness
        .handle(ControlMessage::new("agent:main:main", "stop").unauthorized())
        .await;
    let plain = harness
        .handle(ControlMessage::new("agent:main:main", "stop the build when it fails"))
        .await;

    assert_eq!(unauthorized, ControlOutcome::default());
    assert_eq!(plain, ControlOutcome::default());
    assert!(harness.runs.is_active("s-main"));
    assert!(!harness.entry("agent:main:main").await.aborted_last_run);
}

#[tokio::test(flavor = "current_thread")]
async fn explicit_target_expected_override_session_aborted() {
    let harness = Harness::new(vec![
        ("agent:main:main", SessionEntry::new("s-main", NOW_MS)),
        ("agent:main:worker", SessionEntry::new("s-worker", NOW_MS)),
    ]);
    harness.runs.register("s-main");
    harness.runs.register("s-worker");

    let outcome = harness
        .handle(ControlMessage::new("agent:main:main", "/stop").with_target("agent:main:worker"))
        .await;

    assert!(outcome.aborted);
    assert!(!harness.runs.is_active("s-worker"));
    assert!(harness.runs.is_active("s-main"));
}

#[tokio::test(flavor = "current_thread")]
async fn missing_record_expected_intent_honored_once_record_exists() {
    let harness = Harness::new(Vec::new());
    harness.enqueue("agent:main:new", "early message");

    let first = harness
        .handle(ControlMessage::new("agent:main:new", "abort"))
        .await;
    let second = harness
        .handle(ControlMessage::new("agent:main:new", "abort"))
        .await;
    assert!(first.aborted);
    assert!(!second.aborted);
    assert!(harness.plane.intents().contains("agent:main:new"));
    assert!(!harness.plane.queues().is_active("agent:main:new"));
    assert!(
        !harness
            .plane
            .honor_pending_abort("agent:main:new")
            .await
            .expect("honor should succeed")
    );

    harness
        .store
        .upsert("agent:main:new", SessionEntry::new("s-new", NOW_MS))
        .await
        .expect("upsert should succeed");
    let run = harness.runs.register("s-new");

    assert!(
        harness
            .plane
            .honor_pending_abort("agent:main:new")
            .await
            .expect("honor should succeed")
    );
    assert!(run.is_abort_requested());
    assert!(harness.entry("agent:main:new").await.aborted_last_run);
    assert!(harness.plane.intents().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn take_abort_flag_expected_next_stop_aborts_again() {
    let harness = Harness::new(vec![("agent:main:main", SessionEntry::new("s-main", NOW_MS))]);
    harness
        .handle(ControlMessage::new("agent:main:main", "stop"))
        .await;

    assert!(
        harness
            .plane
            .take_abort_flag("agent:main:main")
            .await
            .expect("flag read should succeed")
    );
    assert!(
        !harness
            .plane
            .take_abort_flag("agent:main:main")
            .await
            .expect("flag read should succeed")
    );

    let run = harness.runs.register("s-main");
    let outcome = harness
        .handle(ControlMessage::new("agent:main:main", "stop"))
        .await;
    assert!(outcome.aborted);
    assert!(run.is_abort_requested());
}

struct LockedStore;

#[async_trait]
impl SessionStore for LockedStore {
    async fn get(&self, _session_key: &str) -> SessionStoreResult<Option<SessionEntry>> {
        Err(SessionStoreError::Locked("sessions.json.lock".to_string()))
    }

    async fn update(
        &self,
        _session_key: &str,
        _mutate: SessionMutation,
    ) -> SessionStoreResult<Option<SessionEntry>> {
        Err(SessionStoreError::Locked("sessions.json.lock".to_string()))
    }

    async fn upsert(&self, _session_key: &str, _entry: SessionEntry) -> SessionStoreResult<()> {
        Err(SessionStoreError::Locked("sessions.json.lock".to_string()))
    }

    async fn list(&self) -> SessionStoreResult<Vec<(SessionKey, SessionEntry)>> {
        Err(SessionStoreError::Locked("sessions.json.lock".to_string()))
    }
}

#[tokio::test(flavor = "current_thread")]
async fn locked_store_expected_error_surfaced() {
    let plane = ControlPlane::new(
        FollowupQueues::default(),
        Arc::new(LockedStore),
        Arc::new(MemorySubagentRegistry::new()),
        Arc::new(ActiveRuns::new()),
        ControlConfig::default(),
    )
    .expect("control plane should build");

    let error = plane
        .handle_inbound_control_message(&ControlMessage::new("agent:main:main", "stop"))
        .await
        .expect_err("locked store should fail the abort");
    assert!(error.is_locked());
}
