pub mod anthropic;
mod chat_completions;
pub mod copilot;
pub mod device_flow;
pub mod factory;
pub mod http_client;
pub mod openai;
pub mod scrub;
pub mod traits;
pub mod types;

pub use factory::{create_provider, resolve_api_key};
pub use scrub::{api_error, sanitize_api_error, scrub_secret_patterns};
pub use traits::Provider;
pub use types::{MessageRole, ProviderMessage, ProviderResponse, ProviderSettings};
