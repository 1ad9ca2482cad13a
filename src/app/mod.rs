//! Command surface: the Telegram worker, result formatting and the CLI
//! entry points.

pub mod bot;
pub mod commands;
pub mod dispatch;
pub mod format;
pub mod sink;
pub mod status;

pub use bot::{Worker, WorkerDeps, WorkerSettings};
pub use dispatch::dispatch;
pub use sink::ChannelSink;
