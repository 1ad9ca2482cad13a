use crate::temp_store;
use chrono::{Duration, Utc};
use media_leverage::core::{ConversationKey, Platform, SourceKind};
use media_leverage::store::{
    DeleteRange, MessageStore, NewMessage, NewOutput, NewThought, TagStore, ThoughtStore,
    TimeBound,
};
use std::sync::Arc;

fn thought(actor: i64, summary: &str) -> NewThought {
    NewThought {
        actor,
        created_at: Utc::now(),
        raw_input: format!("input for {summary}"),
        source: SourceKind::Text,
        idea_type: "essay".into(),
        novelty_score: Some(6),
        clarity_score: Some(6),
        publishable: true,
        risk_level: "low".into(),
        summary: summary.into(),
    }
}

#[tokio::test]
async fn records_are_visible_only_to_their_owner() {
    let (_tmp, store) = temp_store().await;
    let thoughts: Arc<dyn ThoughtStore> = Arc::new(store);

    let mine = thoughts
        .commit(
            thought(1, "mine"),
            vec![NewOutput {
                platform: Platform::X,
                content: "post".into(),
                tokens_used: 10,
            }],
        )
        .await
        .unwrap();
    thoughts.commit(thought(2, "theirs"), Vec::new()).await.unwrap();

    assert!(thoughts.thought_with_outputs(mine, 1).await.unwrap().is_some());
    assert!(thoughts.thought_with_outputs(mine, 2).await.unwrap().is_none());
    assert_eq!(thoughts.count_thoughts(1).await.unwrap(), 1);
    assert_eq!(thoughts.count_thoughts(2).await.unwrap(), 1);

    let recent = thoughts.recent_thoughts(2, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].summary, "theirs");
}

#[tokio::test]
async fn conversations_of_one_actor_do_not_share_notes_or_markers() {
    let (_tmp, store) = temp_store().await;
    let messages: Arc<dyn MessageStore> = Arc::new(store.clone());
    let tags: Arc<dyn TagStore> = Arc::new(store);
    let private = ConversationKey::new(1, 100);
    let group = ConversationKey::new(1, 200);
    let t0 = Utc::now();

    for (key, text) in [(private, "private note"), (group, "group note")] {
        messages
            .append_message(NewMessage {
                key,
                source_message_id: None,
                text: text.into(),
                created_at: t0,
            })
            .await
            .unwrap();
    }
    tags.insert_tag(group, None, t0 + Duration::seconds(1))
        .await
        .unwrap();

    assert!(tags.latest_tag(private).await.unwrap().is_none());
    assert!(tags.latest_tag(group).await.unwrap().is_some());

    let removed = messages
        .delete_messages(group, DeleteRange::Through(t0))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let left = messages
        .messages_since(private, TimeBound::Inclusive(t0 - Duration::days(1)))
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].text, "private note");
}

#[tokio::test]
async fn consuming_a_marker_removes_older_markers_but_not_newer_ones() {
    let (_tmp, store) = temp_store().await;
    let tags: Arc<dyn TagStore> = Arc::new(store);
    let key = ConversationKey::new(3, 30);
    let t0 = Utc::now();

    let first = tags.insert_tag(key, Some("a"), t0).await.unwrap();
    let second = tags
        .insert_tag(key, Some("b"), t0 + Duration::seconds(1))
        .await
        .unwrap();
    let third = tags
        .insert_tag(key, Some("c"), t0 + Duration::seconds(2))
        .await
        .unwrap();

    assert_eq!(tags.delete_through(&second).await.unwrap(), 2);
    assert!(!tags.delete_tag(first.id).await.unwrap());
    let latest = tags.latest_tag(key).await.unwrap().expect("newest marker kept");
    assert_eq!(latest.id, third.id);
    assert_eq!(latest.label.as_deref(), Some("c"));
}
