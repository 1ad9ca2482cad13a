use super::traits::{Channel, InboundEvent};
use std::sync::Arc;
use std::time::Duration;

pub const INITIAL_BACKOFF_SECS: u64 = 2;
pub const MAX_BACKOFF_SECS: u64 = 60;

/// Run `channel.listen` forever, restarting it with exponential back-off
/// until the receiving side of `tx` is dropped.
pub fn spawn_supervised_listener(
    channel: Arc<dyn Channel>,
    tx: tokio::sync::mpsc::Sender<InboundEvent>,
    initial_backoff: Duration,
    max_backoff: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let initial = initial_backoff.max(Duration::from_millis(1));
        let max_backoff = max_backoff.max(initial);
        let mut backoff = initial;

        loop {
            tracing::debug!(channel = channel.name(), "listener starting");
            let result = channel.listen(tx.clone()).await;

            if tx.is_closed() {
                break;
            }

            match result {
                Ok(()) => {
                    tracing::warn!(channel = channel.name(), "listener exited; restarting");
                    backoff = initial;
                }
                Err(e) => {
                    tracing::error!(
                        channel = channel.name(),
                        error = %format!("{e:#}"),
                        retry_in = ?backoff,
                        "listener failed; restarting"
                    );
                }
            }

            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}
