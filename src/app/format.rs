//! Telegram MarkdownV2 rendering of run results and stored records.
//!
//! Everything returned here is already escaped and must be sent with
//! [`OutboundMessage::markdown`](crate::transport::OutboundMessage::markdown).

use crate::core::{Evaluation, Platform};
use crate::store::{OutputRecord, ThoughtRecord};

/// Characters MarkdownV2 treats as markup.
const ESCAPE_CHARS: &str = "\\_*[]()~`>#+-=|{}.!";

const BAR_CELLS: u8 = 10;
/// Inline platform cards stay this far below the 4096 message cap.
pub const MAX_INLINE_CHARS: usize = 3800;
pub const MAX_RECORD_CHUNK: usize = 4000;
const TRUNCATION_HEADROOM: usize = 100;
const WORD_BACKOFF: usize = 50;
const HISTORY_SUMMARY_CHARS: usize = 60;
const SEPARATOR_WIDTH: usize = 17;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        if ESCAPE_CHARS.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Ten-cell bar, clamped to 0..=10.
pub fn score_bar(score: Option<u8>) -> String {
    let filled = score.unwrap_or(0).min(BAR_CELLS);
    let mut bar = "█".repeat(usize::from(filled));
    bar.push_str(&"░".repeat(usize::from(BAR_CELLS - filled)));
    bar
}

pub fn platform_icon(platform: Platform) -> &'static str {
    match platform {
        Platform::X => "🐦",
        Platform::Medium => "📝",
        Platform::Substack => "📧",
        Platform::Reddit => "🤖",
    }
}

fn score_line(label: &str, score: Option<u8>) -> String {
    format!(
        "{}: {}/10  {}",
        escape(label),
        score.unwrap_or(0),
        escape(&score_bar(score))
    )
}

fn publishable_icon(publishable: bool) -> &'static str {
    if publishable { "✅" } else { "❌" }
}

fn card_header(platform: Platform) -> String {
    format!(
        "{} *{}*\n{}\n",
        platform_icon(platform),
        escape(platform.title()),
        escape(&"─".repeat(SEPARATOR_WIDTH))
    )
}

/// Summary card sent first after every committed run.
pub fn analysis_card(evaluation: &Evaluation, platforms: &[Platform], thought_id: i64) -> String {
    let recommended = if platforms.is_empty() {
        "N/A".to_string()
    } else {
        platforms
            .iter()
            .map(|p| p.title())
            .collect::<Vec<_>>()
            .join(" → ")
    };

    [
        t!("format.analysis_title").to_string(),
        String::new(),
        format!("{}: `{}`", escape(&t!("format.type")), escape(&evaluation.idea_type)),
        score_line(&t!("format.novelty"), evaluation.novelty_score),
        score_line(&t!("format.clarity"), evaluation.clarity_score),
        format!("{}: `{}`", escape(&t!("format.risk")), escape(&evaluation.risk_level)),
        format!(
            "{}: {}",
            escape(&t!("format.publishable")),
            publishable_icon(evaluation.publishable)
        ),
        String::new(),
        format!("💡 {}: {}", escape(&t!("format.summary")), escape(&evaluation.summary)),
        String::new(),
        format!(
            "📌 {}: *{}*",
            escape(&t!("format.recommended")),
            escape(&recommended)
        ),
        format!(
            "_\\({}\\)_",
            escape(&t!("format.record_footer", id = thought_id))
        ),
    ]
    .join("\n")
}

/// One generated draft. Returns the message and whether it was truncated.
pub fn platform_card(platform: Platform, content: &str, thought_id: i64) -> (String, bool) {
    let header = card_header(platform);
    let body = escape(content);
    let header_len = header.chars().count();

    if header_len + body.chars().count() <= MAX_INLINE_CHARS {
        return (header + &body, false);
    }

    let budget = MAX_INLINE_CHARS.saturating_sub(header_len + TRUNCATION_HEADROOM);
    let mut kept: String = body.chars().take(budget).collect();
    if let Some(space) = kept.rfind(' ') {
        let space_chars = kept[..space].chars().count();
        if space_chars + WORD_BACKOFF > budget {
            kept.truncate(space);
        }
    }
    trim_dangling_escape(&mut kept);

    let footer = format!(
        "\n\n_\\({}\\)_",
        escape(&t!("format.truncated_footer", id = thought_id))
    );
    (header + &kept + &footer, true)
}

pub fn history(records: &[ThoughtRecord]) -> String {
    if records.is_empty() {
        return escape(&t!("format.history_empty"));
    }

    let mut lines = vec![t!("format.history_title").to_string(), String::new()];
    for record in records {
        lines.push(format!(
            "`#{}` {} \\| `{}` \\| {}/10",
            record.id,
            escape(&record.created_at.format("%Y-%m-%d").to_string()),
            escape(&record.idea_type),
            record.novelty_score.unwrap_or(0)
        ));
        let summary: String = record.summary.chars().take(HISTORY_SUMMARY_CHARS).collect();
        if !summary.is_empty() {
            lines.push(format!("     _{}_", escape(&summary)));
        }
        lines.push(format!("     👉 /show {}", record.id));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// `/show` view: the evaluation first, then every output split to fit.
pub fn full_record(thought: &ThoughtRecord, outputs: &[OutputRecord]) -> Vec<String> {
    let overview = [
        format!("📊 *{} \\#{}*", escape(&t!("format.record_title")), thought.id),
        String::new(),
        format!(
            "{}: `{}`",
            escape(&t!("format.date")),
            escape(&thought.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
        ),
        format!("{}: `{}`", escape(&t!("format.source")), escape(thought.source.as_str())),
        format!("{}: `{}`", escape(&t!("format.type")), escape(&thought.idea_type)),
        score_line(&t!("format.novelty"), thought.novelty_score),
        score_line(&t!("format.clarity"), thought.clarity_score),
        format!(
            "{}: `{}`  {}: {}",
            escape(&t!("format.risk")),
            escape(&thought.risk_level),
            escape(&t!("format.publishable")),
            publishable_icon(thought.publishable)
        ),
        String::new(),
        format!("💡 {}", escape(&thought.summary)),
    ]
    .join("\n");

    let mut messages = vec![overview];
    for output in outputs {
        let card = card_header(output.platform) + &escape(&output.content);
        messages.extend(split_message(&card, MAX_RECORD_CHUNK));
    }
    messages
}

/// Hard split at `max_chars`, never leaving an escape backslash at the end
/// of a chunk.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(2);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());
        if end < chars.len() && ends_with_dangling_escape(&chars[start..end]) {
            end -= 1;
        }
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    chunks
}

fn ends_with_dangling_escape(chars: &[char]) -> bool {
    chars.iter().rev().take_while(|c| **c == '\\').count() % 2 == 1
}

fn trim_dangling_escape(text: &mut String) {
    let chars: Vec<char> = text.chars().collect();
    if ends_with_dangling_escape(&chars) {
        text.pop();
    }
}
