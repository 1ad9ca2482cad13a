use crate::harness::{ACTOR, CollectingSink, FlakyThoughts, evaluation_json, key};
use crate::{fixture, fixture_with};
use chrono::{Duration, Utc};
use media_leverage::core::RunRequest;
use media_leverage::error::{PipelineErrorKind, RunStage};
use media_leverage::store::{SqliteStore, ThoughtStore};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn second_generation_failure_persists_nothing_and_retry_is_identical() {
    let fx = fixture().await;
    let now = Utc::now();
    fx.window
        .accumulate(key(), Some(1), "draft one", now)
        .await
        .unwrap();
    fx.window
        .accumulate(key(), Some(2), "draft two", now + Duration::milliseconds(1))
        .await
        .unwrap();
    fx.provider.reply(evaluation_json("essay", 8, true));
    fx.provider.fail_platform("medium");
    let sink = CollectingSink::default();

    let window = fx.window.resolve(key(), None, now).await.unwrap();
    let err = fx
        .orchestrator
        .run(RunRequest::from_window(window.clone()), &sink)
        .await
        .expect_err("generation failure aborts the run");

    assert_eq!(err.stage, RunStage::Generating);
    assert!(matches!(
        err.kind,
        PipelineErrorKind::Generation { ref platform } if platform == "medium"
    ));
    // Substack is never attempted once medium fails.
    assert_eq!(fx.provider.generated_platforms(), ["x", "medium"]);
    assert_eq!(fx.store.count_thoughts(ACTOR).await.unwrap(), 0);
    assert!(sink.reports.lock().unwrap().is_empty());

    let retry_window = fx.window.resolve(key(), None, now).await.unwrap();
    assert_eq!(retry_window.messages, window.messages);

    fx.provider.heal_platform("medium");
    fx.provider.reply(evaluation_json("essay", 8, true));
    let report = fx
        .orchestrator
        .run(RunRequest::from_window(retry_window), &sink)
        .await
        .unwrap();
    assert_eq!(report.drafts.len(), 3);
    assert_eq!(fx.store.count_thoughts(ACTOR).await.unwrap(), 1);
    assert!(fx.window.resolve(key(), None, now).await.unwrap().is_empty());
}

#[tokio::test]
async fn evaluation_backend_error_aborts_before_any_generation() {
    let fx = fixture().await;
    fx.provider.fail_next("connection reset");

    let err = fx
        .orchestrator
        .run(
            RunRequest::submission(ACTOR, media_leverage::core::SourceKind::Text, "notes"),
            &CollectingSink::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, RunStage::Evaluating);
    assert!(matches!(err.kind, PipelineErrorKind::Evaluation));
    assert_eq!(fx.provider.call_count(), 1);
    assert_eq!(fx.store.count_thoughts(ACTOR).await.unwrap(), 0);
}

#[tokio::test]
async fn unreadable_evaluation_fails_closed_without_generation() {
    let fx = fixture().await;
    fx.provider.reply("I think this is a great essay!");

    let report = fx
        .orchestrator
        .run(
            RunRequest::submission(ACTOR, media_leverage::core::SourceKind::Text, "notes"),
            &CollectingSink::default(),
        )
        .await
        .unwrap();

    assert!(!report.evaluation.publishable);
    assert_eq!(report.evaluation.novelty_score, Some(0));
    assert!(report.drafts.is_empty());
    assert_eq!(fx.provider.call_count(), 1);
    assert_eq!(fx.store.count_thoughts(ACTOR).await.unwrap(), 1);
}

#[tokio::test]
async fn commit_failure_leaves_window_in_place() {
    let store = SqliteStore::in_memory().await.unwrap();
    let thoughts = FlakyThoughts::new(store.clone());
    let fx = fixture_with(store, thoughts.clone());
    let now = Utc::now();
    fx.window
        .accumulate(key(), None, "keep me", now)
        .await
        .unwrap();
    fx.provider.reply(evaluation_json("thread", 5, true));
    let sink = CollectingSink::default();

    let window = fx.window.resolve(key(), None, now).await.unwrap();
    let err = fx
        .orchestrator
        .run(RunRequest::from_window(window), &sink)
        .await
        .unwrap_err();

    assert_eq!(err.stage, RunStage::Committing);
    assert!(matches!(err.kind, PipelineErrorKind::Persistence));
    assert!(sink.reports.lock().unwrap().is_empty());
    assert_eq!(
        fx.window.resolve(key(), None, now).await.unwrap().content(),
        "keep me"
    );

    thoughts.failing.store(false, Ordering::SeqCst);
    fx.provider.reply(evaluation_json("thread", 5, true));
    let window = fx.window.resolve(key(), None, now).await.unwrap();
    fx.orchestrator
        .run(RunRequest::from_window(window), &sink)
        .await
        .unwrap();
    assert_eq!(fx.store.count_thoughts(ACTOR).await.unwrap(), 1);
    assert!(fx.window.resolve(key(), None, now).await.unwrap().is_empty());
}
