#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::Result;
use clap::Parser;
use media_leverage::Config;
use media_leverage::cli::Cli;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Both ring and aws-lc-rs may be linked; pick one explicitly.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();
    let config = Config::load_or_init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.observability.level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    media_leverage::app::dispatch(cli, config).await
}
