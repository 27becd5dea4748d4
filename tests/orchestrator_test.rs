//! Orchestrator behaviour against the in-memory backend
//!
//! Covers the session invariants end to end: one active session per
//! (user, scenario) under concurrency, no residue from failed launches,
//! idempotent teardown, immutable project ids and ownership isolation.

use cyberrange::{
    backend::memory::{BackendCall, Operation},
    config::DatabaseConfig,
    logging::init_test_logging,
    BackendError, CleanupOutcome, DefineScenario, Difficulty, ErrorKind, MemoryBackend,
    NodeListing, Orchestrator, RangeError, Requester, SessionStatus, StartOutcome, Store,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    orchestrator: Orchestrator,
    backend: Arc<MemoryBackend>,
    store: Store,
    template_id: String,
    scenario_id: i64,
    _dir: TempDir,
}

async fn harness() -> Harness {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let store = Store::open(&DatabaseConfig {
        path: dir.path().join("range.db"),
        max_connections: 8,
    })
    .await
    .unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let template_id = backend.add_project("intro_firewall_template", &["fw", "attacker", "victim"]);
    let orchestrator = Orchestrator::new(&store, backend.clone());

    let scenario = orchestrator
        .define_scenario(
            "instructor-1",
            DefineScenario {
                name: "Intro Firewall Lab".to_string(),
                description: "Block the attacker, keep the victim reachable".to_string(),
                difficulty: Difficulty::Beginner,
                template_project_id: Some(template_id.clone()),
            },
        )
        .await
        .unwrap();

    Harness {
        orchestrator,
        backend,
        store,
        template_id,
        scenario_id: scenario.id,
        _dir: dir,
    }
}

fn alice() -> Requester {
    Requester::new("user-alice", "alice")
}

fn bob() -> Requester {
    Requester::new("user-bob", "bob")
}

async fn count_sessions(store: &Store, status: Option<&str>) -> i64 {
    let (count,): (i64,) = match status {
        Some(status) => sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE status = ?")
            .bind(status)
            .fetch_one(store.pool())
            .await
            .unwrap(),
        None => sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(store.pool())
            .await
            .unwrap(),
    };
    count
}

#[tokio::test]
async fn test_concurrent_launches_create_one_session() {
    let h = harness().await;
    // Widen the window between the active check and the insert
    h.backend
        .set_latency(Operation::Duplicate, Duration::from_millis(50));

    let attempts = 8;
    let mut handles = Vec::new();
    for _ in 0..attempts {
        let orchestrator = h.orchestrator.clone();
        let scenario_id = h.scenario_id;
        handles.push(tokio::spawn(async move {
            orchestrator.launch(&alice(), scenario_id).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Conflict, "{}", err);
                conflicts += 1;
            }
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, attempts - 1);
    assert_eq!(h.backend.call_count(Operation::Duplicate), 1);
    assert_eq!(h.backend.project_ids().len(), 2); // template + one copy
    assert_eq!(count_sessions(&h.store, Some("active")).await, 1);
}

#[tokio::test]
async fn test_distinct_users_launch_in_parallel() {
    let h = harness().await;
    let (alice, bob) = (alice(), bob());
    let (a, b) = tokio::join!(
        h.orchestrator.launch(&alice, h.scenario_id),
        h.orchestrator.launch(&bob, h.scenario_id)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.session.project_id, b.session.project_id);
    assert_eq!(count_sessions(&h.store, Some("active")).await, 2);
}

#[tokio::test]
async fn test_insert_lost_to_another_process_discards_copy() {
    let h = harness().await;
    // A second orchestrator shares the database but not the in-process locks
    let other = Orchestrator::new(&h.store, h.backend.clone());
    h.backend
        .set_latency(Operation::Duplicate, Duration::from_millis(50));

    let alice = alice();
    let (a, b) = tokio::join!(
        h.orchestrator.launch(&alice, h.scenario_id),
        other.launch(&alice, h.scenario_id)
    );

    let (winner, err) = match (a, b) {
        (Ok(report), Err(err)) | (Err(err), Ok(report)) => (report, err),
        (a, b) => panic!(
            "expected one success and one conflict, got ok={} / ok={}",
            a.is_ok(),
            b.is_ok()
        ),
    };
    assert_eq!(err.kind(), ErrorKind::Conflict, "{}", err);

    // Both copies were made; the loser's was deleted again
    assert_eq!(h.backend.call_count(Operation::Duplicate), 2);
    assert_eq!(h.backend.call_count(Operation::Delete), 1);
    let mut remaining = h.backend.project_ids();
    remaining.sort();
    let mut expected = vec![h.template_id.clone(), winner.session.project_id.clone()];
    expected.sort();
    assert_eq!(remaining, expected);
    assert_eq!(count_sessions(&h.store, None).await, 1);
}

#[tokio::test]
async fn test_failed_duplicate_leaves_nothing_behind() {
    let h = harness().await;
    h.backend.fail(
        Operation::Duplicate,
        BackendError::Unavailable("connection refused".into()),
    );

    let err = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RangeError::ProvisioningFailed(_)));
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);

    assert_eq!(count_sessions(&h.store, None).await, 0);
    assert_eq!(h.backend.project_ids(), vec![h.template_id.clone()]);
    assert_eq!(h.backend.call_count(Operation::Start), 0);

    // A rejected duplicate is reported as such
    h.backend.fail(
        Operation::Duplicate,
        BackendError::Rejected {
            status: 409,
            message: "template is open".into(),
        },
    );
    let err = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendRejected);
    assert_eq!(count_sessions(&h.store, None).await, 0);
}

#[tokio::test]
async fn test_unknown_scenario_never_reaches_backend() {
    let h = harness().await;
    let err = h.orchestrator.launch(&alice(), 999).await.unwrap_err();
    assert!(matches!(err, RangeError::ScenarioNotFound(999)));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_start_failure_gives_degraded_active_session() {
    let h = harness().await;
    h.backend.fail(
        Operation::Start,
        BackendError::Unavailable("request timed out".into()),
    );

    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    assert!(report.is_degraded());
    assert!(matches!(report.start, StartOutcome::Degraded { .. }));
    assert_eq!(report.session.status, SessionStatus::Active);

    // The pair is occupied; a relaunch conflicts rather than duplicating again
    let err = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.backend.call_count(Operation::Duplicate), 1);
}

#[tokio::test]
async fn test_round_trip_copy_is_not_the_template() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    assert_eq!(report.start, StartOutcome::Started);
    assert_ne!(report.session.project_id, h.template_id);

    let name = h.backend.project_name(&report.session.project_id).unwrap();
    assert!(name.starts_with(&format!("intro-firewall-lab_{}_alice_", h.scenario_id)));

    let view = h
        .orchestrator
        .session_view("user-alice", report.session.id)
        .await
        .unwrap();
    assert_eq!(view.scenario_name, "Intro Firewall Lab");
    assert_eq!(view.difficulty, Difficulty::Beginner);
    match view.nodes {
        NodeListing::Available { nodes } => {
            assert_eq!(nodes.len(), 3);
            assert!(nodes.iter().all(|n| n.is_started()));
        }
        NodeListing::Unavailable { reason } => panic!("nodes unavailable: {}", reason),
    }

    // The template itself is untouched
    assert!(h.backend.calls().iter().all(|call| !matches!(
        call,
        BackendCall::Start { project_id } if *project_id == h.template_id
    )));
}

#[tokio::test]
async fn test_view_distinguishes_failed_listing_from_empty() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();

    h.backend.fail(
        Operation::ListNodes,
        BackendError::Unavailable("connection reset".into()),
    );
    let view = h
        .orchestrator
        .session_view("user-alice", report.session.id)
        .await
        .unwrap();
    assert!(matches!(view.nodes, NodeListing::Unavailable { .. }));
}

#[tokio::test]
async fn test_view_of_ended_session_has_no_web_link() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();

    let view = h
        .orchestrator
        .session_view("user-alice", report.session.id)
        .await
        .unwrap();
    assert_eq!(
        view.web_ui_url,
        Some(format!("memory://projects/{}", report.session.project_id))
    );

    h.orchestrator
        .end_session("user-alice", report.session.id)
        .await
        .unwrap();
    let view = h
        .orchestrator
        .session_view("user-alice", report.session.id)
        .await
        .unwrap();
    assert_eq!(view.web_ui_url, None);
    assert!(matches!(view.nodes, NodeListing::Unavailable { .. }));
}

#[tokio::test]
async fn test_end_to_end_intro_firewall_lab() {
    let h = harness().await;
    let first = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();

    let err = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RangeError::SessionAlreadyActive { .. }));
    assert_eq!(h.backend.call_count(Operation::Duplicate), 1);

    let teardown = h
        .orchestrator
        .end_session("user-alice", first.session.id)
        .await
        .unwrap();
    assert_eq!(teardown.session.status, SessionStatus::Ended);
    assert!(teardown.session.ended_at.is_some());
    assert_eq!(teardown.cleanup, CleanupOutcome::Clean);
    assert!(teardown.partial_failure().is_none());

    let project = first.session.project_id.clone();
    let tail: Vec<BackendCall> = h.backend.calls().into_iter().rev().take(2).rev().collect();
    assert_eq!(
        tail,
        vec![
            BackendCall::Stop {
                project_id: project.clone()
            },
            BackendCall::Delete {
                project_id: project.clone()
            },
        ]
    );
    assert!(!h.backend.has_project(&project));

    let second = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    assert_ne!(second.session.id, first.session.id);
    assert_ne!(second.session.project_id, first.session.project_id);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();

    h.orchestrator
        .end_session("user-alice", report.session.id)
        .await
        .unwrap();
    let again = h
        .orchestrator
        .end_session("user-alice", report.session.id)
        .await
        .unwrap();

    assert!(again.already_ended);
    assert_eq!(again.cleanup, CleanupOutcome::Skipped);
    assert_eq!(h.backend.call_count(Operation::Delete), 1);
    assert_eq!(h.backend.call_count(Operation::Stop), 1);
}

#[tokio::test]
async fn test_concurrent_teardowns_delete_once() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    h.backend
        .set_latency(Operation::Stop, Duration::from_millis(30));

    let (a, b) = tokio::join!(
        h.orchestrator.end_session("user-alice", report.session.id),
        h.orchestrator.end_session("user-alice", report.session.id)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.already_ended != b.already_ended);
    assert_eq!(h.backend.call_count(Operation::Delete), 1);
}

#[tokio::test]
async fn test_partial_teardown_still_ends_session() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();

    h.backend.fail(
        Operation::Stop,
        BackendError::Unavailable("request timed out".into()),
    );
    h.backend.fail(
        Operation::Delete,
        BackendError::Rejected {
            status: 500,
            message: "disk full".into(),
        },
    );

    let teardown = h
        .orchestrator
        .end_session("user-alice", report.session.id)
        .await
        .unwrap();
    assert_eq!(teardown.session.status, SessionStatus::Ended);
    assert!(matches!(teardown.cleanup, CleanupOutcome::Partial { .. }));

    // Delete was attempted even though stop failed
    assert_eq!(h.backend.call_count(Operation::Delete), 1);

    let err = teardown.partial_failure().unwrap();
    assert_eq!(err.kind(), ErrorKind::PartialFailure);

    let note = teardown.session.cleanup_error.unwrap();
    assert!(note.contains("stop:"));
    assert!(note.contains("delete:"));

    // The user is not locked out
    h.backend.clear_failure(Operation::Delete);
    h.orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_project_already_gone_counts_as_clean() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();

    // Someone removed the project directly on the server
    assert!(h.backend.remove_project(&report.session.project_id));

    let teardown = h
        .orchestrator
        .end_session("user-alice", report.session.id)
        .await
        .unwrap();
    assert_eq!(teardown.cleanup, CleanupOutcome::Clean);
    assert!(teardown.session.cleanup_error.is_none());
}

#[tokio::test]
async fn test_project_id_is_immutable() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    let original = report.session.project_id.clone();

    let rewrite = sqlx::query("UPDATE sessions SET project_id = 'hijacked' WHERE id = ?")
        .bind(report.session.id)
        .execute(h.store.pool())
        .await;
    assert!(rewrite.is_err());

    let ended = h
        .orchestrator
        .end_session("user-alice", report.session.id)
        .await
        .unwrap();
    assert_eq!(ended.session.project_id, original);
}

#[tokio::test]
async fn test_ownership_isolation() {
    let h = harness().await;
    let report = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    let calls_before = h.backend.calls().len();

    let view_err = h
        .orchestrator
        .session_view("user-bob", report.session.id)
        .await
        .unwrap_err();
    let end_err = h
        .orchestrator
        .end_session("user-bob", report.session.id)
        .await
        .unwrap_err();
    let missing_err = h
        .orchestrator
        .end_session("user-bob", 424242)
        .await
        .unwrap_err();

    assert!(matches!(view_err, RangeError::SessionNotFound(_)));
    assert!(matches!(end_err, RangeError::SessionNotFound(_)));
    // Identical user-facing text for "not yours" and "does not exist"
    assert_eq!(
        end_err.user_message().replace(&report.session.id.to_string(), "N"),
        missing_err.user_message().replace("424242", "N")
    );

    assert_eq!(h.backend.calls().len(), calls_before);
    assert_eq!(count_sessions(&h.store, Some("active")).await, 1);
    assert!(h.orchestrator.dashboard("user-bob").await.unwrap().is_empty());
    assert_eq!(h.orchestrator.dashboard("user-alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_define_scenario_creates_template_project() {
    let h = harness().await;
    let scenario = h
        .orchestrator
        .define_scenario(
            "instructor-1",
            DefineScenario {
                name: "VLAN Hopping".to_string(),
                description: String::new(),
                difficulty: Difficulty::Advanced,
                template_project_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        h.backend.project_name(&scenario.template_project_id).as_deref(),
        Some("cyberrange_vlan-hopping")
    );
    assert_eq!(scenario.created_by, "instructor-1");

    let names: Vec<String> = h
        .orchestrator
        .list_scenarios()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Intro Firewall Lab", "VLAN Hopping"]);
}

#[tokio::test]
async fn test_define_scenario_failure_writes_nothing() {
    let h = harness().await;
    h.backend.fail(
        Operation::CreateProject,
        BackendError::Unavailable("connection refused".into()),
    );

    let err = h
        .orchestrator
        .define_scenario(
            "instructor-1",
            DefineScenario {
                name: "Broken".to_string(),
                description: String::new(),
                difficulty: Difficulty::Beginner,
                template_project_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert_eq!(h.orchestrator.list_scenarios().await.unwrap().len(), 1);

    let err = h
        .orchestrator
        .define_scenario(
            "instructor-1",
            DefineScenario {
                name: "   ".to_string(),
                description: String::new(),
                difficulty: Difficulty::Beginner,
                template_project_id: Some("tpl".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[tokio::test]
async fn test_backend_status_probe() {
    let h = harness().await;
    assert_eq!(h.orchestrator.backend_status().await.unwrap(), 1);

    h.backend.fail(
        Operation::ListProjects,
        BackendError::Unavailable("down".into()),
    );
    assert!(h.orchestrator.backend_status().await.is_err());
}

#[tokio::test]
async fn test_active_sessions_listing_is_unscoped() {
    let h = harness().await;
    let a = h
        .orchestrator
        .launch(&alice(), h.scenario_id)
        .await
        .unwrap();
    h.orchestrator
        .launch(&bob(), h.scenario_id)
        .await
        .unwrap();
    h.orchestrator
        .end_session("user-alice", a.session.id)
        .await
        .unwrap();

    let active = h.orchestrator.active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].session.user_id, "user-bob");
    assert_eq!(active[0].scenario_name, "Intro Firewall Lab");
}
