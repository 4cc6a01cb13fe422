mod common;

use std::sync::Arc;

use common::{HarnessBuilder, Script, TWO_QUESTIONS};
use question_forge::models::generation::{GenerationConfig, SourceDescriptor};
use question_forge::models::session::{GenerationSession, Stage};
use question_forge::orchestrator::{App, Commands, RestoreOutcome};
use question_forge::services::{FixedConfirmation, MemorySessionStore, SessionStore};
use question_forge::Config;

fn app_with(store: Arc<MemorySessionStore>, script: Vec<Script>) -> (App, common::Harness) {
    let (deps, harness) = HarnessBuilder::new(script).store(store).build_deps();
    (App::with_deps(Config::default(), deps), harness)
}

fn review_snapshot() -> GenerationSession {
    let mut session = GenerationSession::new(
        SourceDescriptor::text("custom_text", "Arithmetic"),
        GenerationConfig::default(),
    );
    session.stage = Stage::ReadyForReview;
    session.progress_percent = 100;
    session
}

#[tokio::test]
async fn test_restore_without_snapshot() {
    let (mut app, _harness) = app_with(Arc::new(MemorySessionStore::new()), vec![]);
    let outcome = app.restore(&FixedConfirmation(true)).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Empty);
    assert!(app.flow().session().is_none());
}

#[tokio::test]
async fn test_corrupt_snapshot_is_cleared() {
    let store = Arc::new(MemorySessionStore::with_raw("{\"stage\": 42"));
    let (mut app, harness) = app_with(store, vec![]);

    let outcome = app.restore(&FixedConfirmation(true)).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Corrupt);
    assert!(harness.store.is_empty());
    assert_eq!(harness.store.clear_count(), 1);
}

#[tokio::test]
async fn test_declined_resume_dismisses_snapshot() {
    let store = Arc::new(MemorySessionStore::new());
    store.save(&review_snapshot()).await.unwrap();
    let (mut app, harness) = app_with(store, vec![]);

    let outcome = app.restore(&FixedConfirmation(false)).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Dismissed);
    assert!(harness.store.is_empty());
    assert!(app.flow().session().is_none());
}

#[tokio::test]
async fn test_accepted_resume_keeps_review() {
    let store = Arc::new(MemorySessionStore::new());
    store.save(&review_snapshot()).await.unwrap();
    let (mut app, _harness) = app_with(store, vec![]);

    let outcome = app.restore(&FixedConfirmation(true)).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Resumed { reran: false });
    assert_eq!(app.flow().session(), Some(&review_snapshot()));
}

#[tokio::test]
async fn test_resumed_mid_run_snapshot_is_rerun() {
    let mut snapshot = review_snapshot();
    snapshot.stage = Stage::ExtractingStructuredData;
    snapshot.progress_percent = 70;
    let store = Arc::new(MemorySessionStore::new());
    store.save(&snapshot).await.unwrap();
    let (mut app, _harness) = app_with(store, vec![Script::Reply(TWO_QUESTIONS.to_string())]);

    let outcome = app.restore(&FixedConfirmation(true)).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Resumed { reran: true });
    assert_eq!(app.flow().session().unwrap().stage, Stage::ReadyForReview);
}

#[tokio::test]
async fn test_idle_snapshot_is_installed_without_prompt() {
    let mut snapshot = review_snapshot();
    snapshot.stage = Stage::Idle;
    snapshot.progress_percent = 0;
    let store = Arc::new(MemorySessionStore::new());
    store.save(&snapshot).await.unwrap();
    let (mut app, _harness) = app_with(store, vec![]);

    // 拒绝也不会丢弃 Idle 快照：它不需要询问
    let outcome = app.restore(&FixedConfirmation(false)).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Installed(Stage::Idle));
    assert_eq!(app.flow().session(), Some(&snapshot));
}

#[tokio::test]
async fn test_review_commands_act_on_saved_session() {
    let store = Arc::new(MemorySessionStore::new());
    let (mut app, harness) = app_with(store.clone(), vec![Script::Reply(TWO_QUESTIONS.to_string())]);
    app.run(
        Commands::Generate {
            kind: question_forge::orchestrator::cli::SourceArg::Text,
            input: "Arithmetic and astronomy basics.".to_string(),
            count: 2,
            format: question_forge::orchestrator::cli::FormatArg::Json,
            difficulty: "mixed".to_string(),
            action: question_forge::orchestrator::cli::ActionArg::New,
            instruction: None,
            label: "custom_text".to_string(),
        },
        &FixedConfirmation(false),
    )
    .await
    .unwrap();

    // 新的进程：只共享快照
    let (mut next, _next_harness) = app_with(store, vec![]);
    next.run(
        Commands::Approve {
            ids: vec!["q-2".to_string()],
        },
        &FixedConfirmation(false),
    )
    .await
    .unwrap();

    let saved = harness.store.load().await.unwrap().unwrap();
    assert_eq!(saved.stage, Stage::ReadyForReview);
    assert!(saved.approved_ids.contains("q-2"));
    assert!(!saved.approved_ids.contains("q-1"));

    next.run(Commands::Dismiss, &FixedConfirmation(false))
        .await
        .unwrap();
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_review_command_clears_corrupt_snapshot() {
    let store = Arc::new(MemorySessionStore::with_raw("not json"));
    let (mut app, harness) = app_with(store, vec![]);

    app.run(Commands::Show, &FixedConfirmation(true))
        .await
        .unwrap();
    assert!(harness.store.is_empty());
    assert_eq!(harness.store.clear_count(), 1);
    assert!(app.flow().session().is_none());
}
