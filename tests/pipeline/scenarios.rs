use crate::fixture;
use crate::harness::{ACTOR, CollectingSink, evaluation_json, evaluation_with_assessments, key};
use chrono::{Duration, Utc};
use media_leverage::core::{Platform, RunRequest, SourceKind, WindowBound};
use media_leverage::store::ThoughtStore;

#[tokio::test]
async fn novel_essay_is_drafted_for_three_platforms() {
    let fx = fixture().await;
    fx.provider.reply(evaluation_json("essay", 8, true));
    let sink = CollectingSink::default();

    let report = fx
        .orchestrator
        .run(
            RunRequest::submission(ACTOR, SourceKind::Text, "why small teams ship faster"),
            &sink,
        )
        .await
        .expect("run commits");

    assert_eq!(
        report.platforms(),
        vec![Platform::X, Platform::Medium, Platform::Substack]
    );
    assert_eq!(fx.provider.generated_platforms(), ["x", "medium", "substack"]);
    assert_eq!(fx.provider.call_count(), 4);
    assert!(report.evaluation.publishable);
    assert_eq!(report.tokens_used, 150 + 3 * 50);

    let evaluation_call = &fx.provider.calls()[0];
    assert!(evaluation_call.last_user().contains("why small teams ship faster"));

    let (thought, outputs) = fx
        .store
        .thought_with_outputs(report.thought_id, ACTOR)
        .await
        .unwrap()
        .expect("committed thought");
    assert_eq!(thought.source, SourceKind::Text);
    assert_eq!(thought.raw_input, "why small teams ship faster");
    assert_eq!(thought.novelty_score, Some(8));
    let mut platforms: Vec<Platform> = outputs.iter().map(|o| o.platform).collect();
    platforms.sort();
    assert_eq!(
        platforms,
        vec![Platform::X, Platform::Medium, Platform::Substack]
    );
    assert!(outputs.iter().all(|o| o.tokens_used == 50));

    let delivered = sink.reports.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].thought_id, report.thought_id);
}

#[tokio::test]
async fn low_novelty_routes_to_the_always_on_platform_only() {
    let fx = fixture().await;
    fx.provider.reply(evaluation_json("analysis", 2, true));

    let report = fx
        .orchestrator
        .run(
            RunRequest::submission(ACTOR, SourceKind::Text, "a passing thought"),
            &CollectingSink::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.platforms(), vec![Platform::X]);
    assert_eq!(fx.provider.generated_platforms(), ["x"]);
}

#[tokio::test]
async fn unpublishable_window_commits_evaluation_and_is_consumed() {
    let fx = fixture().await;
    let now = Utc::now();
    fx.window
        .accumulate(key(), Some(1), "half an idea", now)
        .await
        .unwrap();
    fx.window
        .accumulate(key(), Some(2), "the other half", now + Duration::milliseconds(5))
        .await
        .unwrap();
    fx.provider.reply(evaluation_json("opinion", 9, false));

    let window = fx.window.resolve(key(), None, now).await.unwrap();
    assert!(matches!(window.bound, WindowBound::Day { .. }));
    let report = fx
        .orchestrator
        .run(RunRequest::from_window(window), &CollectingSink::default())
        .await
        .unwrap();

    assert!(report.drafts.is_empty());
    assert!(!report.evaluation.publishable);
    assert_eq!(fx.provider.call_count(), 1);

    let (thought, outputs) = fx
        .store
        .thought_with_outputs(report.thought_id, ACTOR)
        .await
        .unwrap()
        .unwrap();
    assert!(!thought.publishable);
    assert_eq!(thought.source, SourceKind::DayWindow);
    assert_eq!(thought.raw_input, "half an idea\n\nthe other half");
    assert!(outputs.is_empty());

    let after = fx.window.resolve(key(), None, now).await.unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn explicit_platform_rejection_drops_only_that_platform() {
    let fx = fixture().await;
    fx.provider.reply(evaluation_with_assessments(
        "essay",
        8,
        serde_json::json!([
            {"platform": "substack", "publishable": false, "reason": "too thin for a newsletter"},
            {"platform": "medium", "summary": "long-form angle"}
        ]),
    ));

    let report = fx
        .orchestrator
        .run(
            RunRequest::submission(ACTOR, SourceKind::File, "notes"),
            &CollectingSink::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.platforms(), vec![Platform::X, Platform::Medium]);
    assert_eq!(fx.provider.generated_platforms(), ["x", "medium"]);
    assert_eq!(report.plans[1].summary, "long-form angle");
    assert!(report.evaluation.publishable);
}

#[tokio::test]
async fn fenced_evaluation_output_is_still_read() {
    let fx = fixture().await;
    fx.provider.reply(format!(
        "Here is my assessment:\n```json\n{}\n```",
        evaluation_json("news", 5, true)
    ));

    let report = fx
        .orchestrator
        .run(
            RunRequest::submission(ACTOR, SourceKind::Text, "launch recap"),
            &CollectingSink::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.evaluation.idea_type, "news");
    assert_eq!(report.platforms(), vec![Platform::X, Platform::Reddit]);
}

#[tokio::test]
async fn tag_window_consumption_keeps_later_notes() {
    let fx = fixture().await;
    let t0 = Utc::now();
    fx.window
        .accumulate(key(), None, "before the marker", t0)
        .await
        .unwrap();
    fx.window
        .place_tag(key(), Some("launch"), t0 + Duration::milliseconds(10))
        .await
        .unwrap();
    fx.window
        .accumulate(key(), None, "after the marker", t0 + Duration::milliseconds(20))
        .await
        .unwrap();

    let window = fx.window.resolve(key(), None, t0).await.unwrap();
    assert_eq!(window.content(), "after the marker");

    // Arrives while the run is in flight.
    fx.window
        .accumulate(key(), None, "late note", t0 + Duration::milliseconds(30))
        .await
        .unwrap();

    fx.provider.reply(evaluation_json("thread", 6, true));
    fx.orchestrator
        .run(RunRequest::from_window(window), &CollectingSink::default())
        .await
        .unwrap();

    // Everything up to the last consumed note goes, including notes older
    // than the marker. The marker itself is gone, so the day window applies.
    let after = fx.window.resolve(key(), None, t0).await.unwrap();
    assert!(matches!(after.bound, WindowBound::Day { .. }));
    assert_eq!(after.content(), "late note");
}
