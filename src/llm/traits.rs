use super::types::{ProviderMessage, ProviderResponse};
use std::future::Future;
use std::pin::Pin;

/// A text-generation backend.
///
/// Model and sampling settings are fixed at construction; callers only
/// choose the prompt and the output budget.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "anthropic", "copilot").
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Single-shot generation from a system instruction and one user input.
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            let messages = [ProviderMessage::user(user)];
            self.converse(system, &messages, max_tokens).await
        })
    }

    /// Multi-turn generation over an ordered conversation.
    fn converse<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [ProviderMessage],
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>>;

    /// Warm up the HTTP connection pool or credentials.
    fn warmup(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }
}
