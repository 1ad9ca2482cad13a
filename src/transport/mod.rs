//! Chat transports and the listener supervisor.

pub mod supervisor;
pub mod telegram;
pub mod traits;

pub use supervisor::spawn_supervised_listener;
pub use telegram::TelegramChannel;
pub use traits::{Channel, DocumentRef, InboundEvent, InboundPayload, OutboundMessage, TextFormat};
