use super::format;
use crate::core::{ActivityGuard, Platform, RunReport, RunSink};
use crate::transport::{Channel, OutboundMessage};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Delivers run results to one chat and keeps its typing indicator alive
/// while backend calls are pending.
pub struct ChannelSink {
    channel: Arc<dyn Channel>,
    chat_id: i64,
    activity_interval: Duration,
}

impl ChannelSink {
    pub fn new(channel: Arc<dyn Channel>, chat_id: i64, activity_interval: Duration) -> Self {
        Self {
            channel,
            chat_id,
            activity_interval,
        }
    }
}

/// Spawn the repeating typing signal for `chat_id`. Failures are ignored.
pub fn typing_guard(
    channel: &Arc<dyn Channel>,
    chat_id: i64,
    interval: Duration,
) -> ActivityGuard {
    if interval.is_zero() {
        return ActivityGuard::inert();
    }
    let channel = Arc::clone(channel);
    ActivityGuard::spawn(interval, move || {
        let channel = Arc::clone(&channel);
        async move {
            if let Err(e) = channel.send_activity(chat_id).await {
                tracing::debug!(chat_id, error = %format!("{e:#}"), "activity signal failed");
            }
        }
    })
}

impl RunSink for ChannelSink {
    fn activity(&self) -> ActivityGuard {
        typing_guard(&self.channel, self.chat_id, self.activity_interval)
    }

    fn deliver<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let card =
                format::analysis_card(&report.evaluation, &report.platforms(), report.thought_id);
            let mut messages = vec![(None, card)];
            for draft in &report.drafts {
                let (text, truncated) =
                    format::platform_card(draft.platform, &draft.content, report.thought_id);
                if truncated {
                    tracing::debug!(
                        platform = draft.platform.as_str(),
                        chars = draft.content.chars().count(),
                        "draft truncated for inline delivery"
                    );
                }
                messages.push((Some(draft.platform), text));
            }

            let total = messages.len();
            let mut failed = 0;
            for (platform, text) in messages {
                if let Err(e) = self
                    .channel
                    .send(&OutboundMessage::markdown(text), self.chat_id)
                    .await
                {
                    failed += 1;
                    tracing::warn!(
                        chat_id = self.chat_id,
                        thought_id = report.thought_id,
                        platform = platform.map_or("analysis", Platform::as_str),
                        error = %format!("{e:#}"),
                        "result message not delivered"
                    );
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {total} result messages were not delivered");
            }
            Ok(())
        })
    }
}
