use crate::temp_store;
use chrono::{Duration, Utc};
use media_leverage::core::{ConversationKey, MessageWindow, SourceKind, WindowBound};
use media_leverage::store::{NewOutput, NewThought, SqliteStore, ThoughtStore};
use std::sync::Arc;

fn window_over(store: &SqliteStore) -> MessageWindow {
    let shared = Arc::new(store.clone());
    MessageWindow::new(shared.clone(), shared)
}

#[tokio::test]
async fn notes_and_markers_survive_a_restart() {
    let (tmp, store) = temp_store().await;
    let key = ConversationKey::new(1, 10);
    let t0 = Utc::now();
    let window = window_over(&store);
    window.accumulate(key, Some(1), "old", t0).await.unwrap();
    window
        .place_tag(key, Some("sprint"), t0 + Duration::milliseconds(1))
        .await
        .unwrap();
    window
        .accumulate(key, Some(2), "kept across restart", t0 + Duration::milliseconds(2))
        .await
        .unwrap();
    store.pool().close().await;

    let reopened = SqliteStore::open(&tmp.path().join("leverage.db"))
        .await
        .unwrap();
    let resolved = window_over(&reopened).resolve(key, None, t0).await.unwrap();
    match &resolved.bound {
        WindowBound::Tag(tag) => assert_eq!(tag.label.as_deref(), Some("sprint")),
        other => panic!("expected tag bound, got {other:?}"),
    }
    assert_eq!(resolved.content(), "kept across restart");
    assert_eq!(resolved.messages[0].source_message_id, Some(2));
}

#[tokio::test]
async fn committed_records_survive_a_restart() {
    let (tmp, store) = temp_store().await;
    let id = store
        .commit(
            NewThought {
                actor: 5,
                created_at: Utc::now(),
                raw_input: "raw".into(),
                source: SourceKind::ChatSession,
                idea_type: "story".into(),
                novelty_score: Some(9),
                clarity_score: None,
                publishable: true,
                risk_level: "medium".into(),
                summary: "a story".into(),
            },
            vec![NewOutput {
                platform: media_leverage::core::Platform::Substack,
                content: "newsletter draft".into(),
                tokens_used: 812,
            }],
        )
        .await
        .unwrap();
    store.pool().close().await;

    let reopened = SqliteStore::open(&tmp.path().join("leverage.db"))
        .await
        .unwrap();
    let (thought, outputs) = reopened
        .thought_with_outputs(id, 5)
        .await
        .unwrap()
        .expect("record survives");
    assert_eq!(thought.source, SourceKind::ChatSession);
    assert_eq!(thought.clarity_score, None);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].content, "newsletter draft");
    assert_eq!(outputs[0].tokens_used, 812);
    assert_eq!(reopened.count_thoughts(5).await.unwrap(), 1);
}
