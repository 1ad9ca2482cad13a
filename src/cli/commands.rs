use clap::{Parser, Subcommand};

/// Media Leverage: turn raw notes and chat sessions into platform-ready drafts.
#[derive(Parser, Debug)]
#[command(name = "media-leverage")]
#[command(version)]
#[command(about = "Telegram bot that turns notes into platform-ready drafts.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the Telegram bot (long polling, or a webhook when configured)
    Start,

    /// Check config, database, LLM backend and Telegram connectivity
    Doctor,

    /// Sign in to GitHub with the device flow and store the token for the Copilot backend
    CopilotLogin,
}
