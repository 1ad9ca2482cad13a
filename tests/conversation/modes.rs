use crate::harness::{Bot, evaluation_json};
use crate::latest_record;
use media_leverage::core::SourceKind;

#[tokio::test]
async fn idle_notes_are_analyzed_as_the_day_window() {
    let mut bot = Bot::new().await;
    bot.text("pricing should follow usage").await;
    bot.text("annual plans hide churn").await;
    assert_eq!(bot.pending_notes().await.len(), 2);
    assert!(bot.channel.sent().is_empty());

    bot.provider.reply(evaluation_json("essay", 8, true));
    bot.text("/analyze").await;

    assert!(bot.channel.saw("Reading 2 message(s) from today"));
    assert!(bot.channel.saw("Analysis Results"));
    assert!(bot.channel.saw("draft for substack"));
    assert_eq!(bot.mode(), "idle");
    assert!(bot.pending_notes().await.is_empty());

    let (thought, outputs) = latest_record(&bot).await;
    assert_eq!(thought.source, SourceKind::DayWindow);
    assert_eq!(
        thought.raw_input,
        "pricing should follow usage\n\nannual plans hide churn"
    );
    assert_eq!(outputs.len(), 3);
}

#[tokio::test]
async fn empty_window_is_reported_without_backend_calls() {
    let mut bot = Bot::new().await;
    bot.text("/analyze").await;

    assert_eq!(bot.provider.call_count(), 0);
    assert!(bot.channel.saw("No messages found from today"));
    assert_eq!(bot.thought_count().await, 0);
}

#[tokio::test]
async fn cancelled_chat_discards_only_its_own_turns() {
    let mut bot = Bot::new().await;
    bot.text("an earlier note").await;

    bot.text("/chat").await;
    assert_eq!(bot.mode(), "chatting");
    assert!(bot.channel.saw("Chat mode active"));

    bot.provider.reply("What would the pricing page say?");
    bot.text("thinking about usage pricing").await;
    assert_eq!(bot.channel.last_text(), "What would the pricing page say?");
    assert_eq!(
        bot.pending_notes().await,
        [
            "an earlier note",
            "User: thinking about usage pricing",
            "Assistant: What would the pricing page say?"
        ]
    );

    bot.text("/cancel").await;
    assert_eq!(bot.mode(), "idle");
    assert_eq!(bot.channel.last_text(), "Cancelled.");
    assert_eq!(bot.pending_notes().await, ["an earlier note"]);
}

#[tokio::test]
async fn chat_turns_carry_the_running_transcript() {
    let mut bot = Bot::new().await;
    bot.text("/chat").await;
    bot.provider.reply("first answer");
    bot.text("first question").await;
    bot.provider.reply("second answer");
    bot.text("second question").await;

    let calls = bot.provider.calls();
    let last = calls.last().expect("two chat calls");
    let contents: Vec<&str> = last.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        ["first question", "first answer", "second question"]
    );
    assert!(last.system.contains("/analyze"));
}

#[tokio::test]
async fn failed_chat_reply_keeps_the_user_turn_out_of_the_transcript() {
    let mut bot = Bot::new().await;
    bot.text("/chat").await;
    bot.provider.fail_next("upstream 529");
    bot.text("lost question").await;
    assert!(bot.channel.saw("Chat failed temporarily"));
    assert_eq!(bot.mode(), "chatting");

    bot.provider.reply("answer");
    bot.text("next question").await;
    let calls = bot.provider.calls();
    assert_eq!(calls.last().unwrap().messages.len(), 1);
}

#[tokio::test]
async fn tag_during_chat_discards_the_session_and_places_a_marker() {
    let mut bot = Bot::new().await;
    bot.text("/chat").await;
    bot.provider.reply("sure");
    bot.text("throwaway idea").await;

    bot.text("/tag launch week").await;
    assert_eq!(bot.mode(), "idle");
    assert!(bot.channel.saw("Marker placed \"launch week\""));
    assert!(bot.pending_notes().await.is_empty());

    bot.text("the launch went well").await;
    bot.provider.reply(evaluation_json("news", 5, true));
    bot.text("/analyze").await;
    assert!(bot.channel.saw("Reading 1 message(s) after marker \"launch week\""));
    let (thought, _) = latest_record(&bot).await;
    assert_eq!(thought.source, SourceKind::TagWindow);
    assert_eq!(thought.raw_input, "the launch went well");
}

#[tokio::test]
async fn chat_analyze_failure_keeps_the_session_for_retry() {
    let mut bot = Bot::new().await;
    bot.text("/chat").await;
    bot.provider.reply("tell me more");
    bot.text("an idea about onboarding").await;

    bot.provider.fail_next("timeout");
    bot.text("/analyze").await;
    assert!(bot.channel.saw("retained messages"));
    assert_eq!(bot.mode(), "chatting");
    assert_eq!(bot.pending_notes().await.len(), 2);
    assert_eq!(bot.thought_count().await, 0);

    bot.provider.reply(evaluation_json("tutorial", 7, true));
    bot.text("/analyze").await;
    assert_eq!(bot.mode(), "idle");
    assert!(bot.pending_notes().await.is_empty());
    let (thought, outputs) = latest_record(&bot).await;
    assert_eq!(thought.source, SourceKind::ChatSession);
    assert!(thought.raw_input.starts_with("User: an idea about onboarding"));
    assert_eq!(outputs.len(), 3);
}

#[tokio::test]
async fn empty_chat_analyze_stays_in_chat() {
    let mut bot = Bot::new().await;
    bot.text("/chat").await;
    bot.text("/analyze").await;

    assert!(bot.channel.saw("No messages found from the current /chat session"));
    assert_eq!(bot.mode(), "chatting");
    assert_eq!(bot.provider.call_count(), 0);
}

#[tokio::test]
async fn second_chat_command_is_a_hint() {
    let mut bot = Bot::new().await;
    bot.text("/chat").await;
    bot.text("/chat").await;
    assert!(bot.channel.saw("already in chat mode"));
    assert_eq!(bot.mode(), "chatting");
}

#[tokio::test]
async fn process_submission_runs_once_and_returns_to_idle() {
    let mut bot = Bot::new().await;
    bot.text("/process").await;
    assert_eq!(bot.mode(), "awaiting_content");
    assert!(bot.channel.saw("max 20 MB"));

    bot.provider.reply(evaluation_json("analysis", 6, true));
    bot.text("a pasted article about caching").await;

    assert_eq!(bot.mode(), "idle");
    assert!(bot.channel.saw("Analyzing"));
    assert!(bot.pending_notes().await.is_empty());
    let (thought, outputs) = latest_record(&bot).await;
    assert_eq!(thought.source, SourceKind::Text);
    assert_eq!(thought.raw_input, "a pasted article about caching");
    assert_eq!(outputs.len(), 2);
}

#[tokio::test]
async fn blank_submission_keeps_waiting_for_content() {
    let mut bot = Bot::new().await;
    bot.text("/process").await;
    bot.text("   ").await;

    assert!(bot.channel.saw("Content is empty"));
    assert_eq!(bot.mode(), "awaiting_content");
    assert_eq!(bot.provider.call_count(), 0);
}

#[tokio::test]
async fn failed_submission_ends_process_mode() {
    let mut bot = Bot::new().await;
    bot.text("/process").await;
    bot.provider.fail_next("backend down");
    bot.text("content that will fail").await;

    assert!(bot.channel.saw("Processing failed"));
    assert_eq!(bot.mode(), "idle");
    assert_eq!(bot.thought_count().await, 0);
}

#[tokio::test]
async fn cancel_from_process_mode_returns_to_idle() {
    let mut bot = Bot::new().await;
    bot.text("/process").await;
    bot.text("/cancel").await;
    assert_eq!(bot.mode(), "idle");

    bot.text("a regular note again").await;
    assert_eq!(bot.pending_notes().await, ["a regular note again"]);
}

#[tokio::test]
async fn rejected_draft_message_does_not_block_the_rest() {
    let mut bot = Bot::new().await;
    bot.text("notes on pricing pages").await;
    bot.channel.reject_containing("*Medium*");
    bot.provider.reply(evaluation_json("essay", 8, true));
    bot.text("/analyze").await;

    assert!(bot.channel.saw("Analysis Results"));
    assert!(bot.channel.saw("draft for x"));
    assert!(!bot.channel.saw("draft for medium"));
    assert!(bot.channel.saw("draft for substack"));
    assert_eq!(bot.mode(), "idle");
    assert!(bot.pending_notes().await.is_empty());
    let (_, outputs) = latest_record(&bot).await;
    assert_eq!(outputs.len(), 3);
}
