use crate::harness::{Bot, STRANGER, evaluation_json};
use media_leverage::security::{RatePolicy, RateLimiter};
use media_leverage::transport::{InboundPayload, TextFormat};
use std::time::Duration;

fn one_per_minute() -> RatePolicy {
    RatePolicy {
        window: Duration::from_secs(60),
        max_events: 1,
    }
}

fn roomy() -> RatePolicy {
    RatePolicy {
        window: Duration::from_secs(60),
        max_events: 50,
    }
}

#[tokio::test]
async fn strangers_are_told_their_id_and_nothing_is_stored() {
    let mut bot = Bot::new().await;
    bot.send_as(STRANGER, InboundPayload::from_text("a sneaky note"))
        .await;
    bot.send_as(STRANGER, InboundPayload::from_text("/analyze"))
        .await;

    let texts = bot.channel.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts.iter().all(|t| t.contains("Your Telegram ID: 7")));
    assert_eq!(bot.provider.call_count(), 0);
}

#[tokio::test]
async fn open_commands_work_without_access() {
    let mut bot = Bot::new().await;
    bot.send_as(STRANGER, InboundPayload::from_text("/whoami"))
        .await;
    assert!(bot.channel.saw("Your Telegram ID: 7"));
    assert!(bot.channel.saw("Unauthorized"));

    bot.send_as(STRANGER, InboundPayload::from_text("/help")).await;
    assert!(bot.channel.saw("/show <id>"));

    bot.send_as(STRANGER, InboundPayload::from_text("/start")).await;
    assert!(bot.channel.last_text().contains("Welcome to Media Leverage"));
    assert!(!bot.channel.saw("don't have access"));

    bot.text("/whoami").await;
    assert!(bot.channel.last_text().contains("Authorized"));
}

#[tokio::test]
async fn pipeline_quota_is_enforced_per_actor() {
    let mut bot = Bot::with_limiter(RateLimiter::new(one_per_minute(), roomy())).await;
    bot.text("/process").await;
    bot.provider.reply(evaluation_json("thread", 5, true));
    bot.text("first submission").await;
    assert_eq!(bot.thought_count().await, 1);
    let calls = bot.provider.call_count();

    bot.text("/process").await;
    bot.text("second submission").await;
    assert!(bot.channel.saw("Too many requests"));
    assert_eq!(bot.provider.call_count(), calls);
    assert_eq!(bot.mode(), "awaiting_content");
}

#[tokio::test]
async fn empty_analyze_does_not_spend_quota() {
    let mut bot = Bot::with_limiter(RateLimiter::new(one_per_minute(), roomy())).await;
    bot.text("/analyze").await;
    assert!(bot.channel.saw("No messages found"));

    bot.text("now there is something").await;
    bot.provider.reply(evaluation_json("thread", 5, true));
    bot.text("/analyze").await;
    assert!(!bot.channel.saw("Too many requests"));
    assert_eq!(bot.thought_count().await, 1);
}

#[tokio::test]
async fn chat_turns_have_their_own_quota() {
    let mut bot = Bot::with_limiter(RateLimiter::new(roomy(), one_per_minute())).await;
    bot.text("/chat").await;
    bot.provider.reply("go on");
    bot.text("first turn").await;
    bot.text("second turn").await;

    assert!(bot.channel.saw("Too many requests"));
    assert_eq!(bot.provider.call_count(), 1);
    assert_eq!(bot.pending_notes().await.len(), 2);
    assert_eq!(bot.mode(), "chatting");
}

#[tokio::test]
async fn history_show_and_status_read_committed_records() {
    let mut bot = Bot::new().await;
    bot.text("/history").await;
    assert!(bot.channel.saw("No records yet"));

    bot.text("/process").await;
    bot.provider.reply(evaluation_json("essay", 8, true));
    bot.text("an essay on focus").await;
    let id = crate::latest_record(&bot).await.0.id;
    bot.channel.drain();

    bot.text("/history").await;
    let history = bot.channel.sent();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].format, TextFormat::MarkdownV2);
    assert!(history[0].text.contains("Recent Records"));
    assert!(history[0].text.contains(&format!("#{id}")));
    bot.channel.drain();

    bot.text(&format!("/show {id}")).await;
    let record = bot.channel.drain().join("\n");
    assert!(record.contains("draft for x"));
    assert!(record.contains("draft for medium"));
    assert!(record.contains("draft for substack"));

    bot.text("/show 9999").await;
    assert!(bot.channel.last_text().contains("#9999 not found"));
    bot.text("/show abc").await;
    assert!(bot.channel.last_text().contains("must be a number"));
    bot.text("/show").await;
    assert_eq!(bot.channel.last_text(), "Usage: /show <id>");

    bot.text("/status").await;
    let status = bot.channel.last_text();
    assert!(status.contains("scripted-1"));
    assert!(status.contains("Your records: 1"));
}

#[tokio::test]
async fn unknown_commands_are_answered_and_not_stored() {
    let mut bot = Bot::new().await;
    bot.text("/frobnicate now").await;
    assert!(bot.channel.saw("Unknown command"));
    assert!(bot.pending_notes().await.is_empty());
    assert_eq!(bot.mode(), "idle");
}
