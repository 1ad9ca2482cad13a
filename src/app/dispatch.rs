use super::bot::{Worker, WorkerDeps, WorkerSettings};
use super::commands;
use super::status::render_status;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::llm::{create_provider, device_flow::DeviceFlow};
use crate::security::{RateLimiter, UsersFileAuthorizer};
use crate::store::{MessageStore, SqliteStore, TagStore, ThoughtStore};
use crate::transport::supervisor::{INITIAL_BACKOFF_SECS, MAX_BACKOFF_SECS};
use crate::transport::{Channel, TelegramChannel, spawn_supervised_listener};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

const INBOUND_QUEUE_CAPACITY: usize = 100;
const DOCTOR_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Start => start_bot(config).await,
        Commands::Doctor => doctor(&config).await,
        Commands::CopilotLogin => copilot_login(config).await,
    }
}

async fn start_bot(config: Config) -> Result<()> {
    config.validate_for_bot()?;

    let store = Arc::new(
        SqliteStore::open(&config.storage.db_path())
            .await
            .context("open database")?,
    );
    let provider = create_provider(&config.llm)?;
    if let Err(e) = provider.warmup().await {
        tracing::warn!(error = %format!("{e:#}"), "provider warmup failed (non-fatal)");
    }

    let channel: Arc<dyn Channel> = Arc::new(TelegramChannel::new(&config.telegram));
    let menu = commands::menu();
    if let Err(e) = channel.register_commands(&menu).await {
        tracing::warn!(error = %format!("{e:#}"), "command menu registration failed");
    }

    let worker = Worker::new(
        WorkerDeps {
            channel: Arc::clone(&channel),
            provider: Arc::clone(&provider),
            messages: Arc::clone(&store) as Arc<dyn MessageStore>,
            tags: Arc::clone(&store) as Arc<dyn TagStore>,
            thoughts: store as Arc<dyn ThoughtStore>,
            authorizer: Arc::new(UsersFileAuthorizer::new(config.storage.users_path())),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        },
        WorkerSettings::from_config(&config),
    )?;

    let delivery = config.telegram.webhook_url().unwrap_or("long polling");
    println!("◆ {}", t!("cli.start_title"));
    println!(
        "  › {} {} ({})",
        t!("cli.start_provider"),
        provider.name(),
        provider.model()
    );
    println!("  › {} {}", t!("cli.start_delivery"), delivery);
    println!();
    println!("  {}", t!("cli.start_listening"));

    let (tx, rx) = tokio::sync::mpsc::channel(INBOUND_QUEUE_CAPACITY);
    let listener = spawn_supervised_listener(
        channel,
        tx,
        Duration::from_secs(INITIAL_BACKOFF_SECS),
        Duration::from_secs(MAX_BACKOFF_SECS),
    );

    tokio::select! {
        () = worker.run(rx) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "ctrl-c handler failed");
            }
            println!("  {}", t!("cli.shutdown"));
        }
    }

    listener.abort();
    Ok(())
}

enum CheckResult {
    Ok(String),
    Failed(String),
}

async fn timed<F>(check: &str, fut: F) -> CheckResult
where
    F: std::future::Future<Output = CheckResult>,
{
    match tokio::time::timeout(DOCTOR_CHECK_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => CheckResult::Failed(t!("doctor.timed_out", check = check).to_string()),
    }
}

async fn doctor(config: &Config) -> Result<()> {
    println!("{}", render_status(config));
    println!();
    println!("{}", t!("doctor.title"));

    let mut results = vec![match config.validate_for_bot() {
        Ok(()) => CheckResult::Ok(t!("doctor.config_ok").to_string()),
        Err(e) => CheckResult::Failed(t!("doctor.config_invalid", error = e).to_string()),
    }];

    let db_path = config.storage.db_path();
    results.push(
        timed("database", async {
            match SqliteStore::open(&db_path).await {
                Ok(_) => CheckResult::Ok(
                    t!("doctor.store_ok", path = db_path.display()).to_string(),
                ),
                Err(e) => CheckResult::Failed(
                    t!("doctor.store_failed", error = format!("{e:#}")).to_string(),
                ),
            }
        })
        .await,
    );

    let users = UsersFileAuthorizer::new(config.storage.users_path());
    let count = users.users().await.len();
    let path = users.path().display().to_string();
    results.push(if count == 0 {
        CheckResult::Failed(t!("doctor.users_empty", path = path).to_string())
    } else {
        CheckResult::Ok(t!("doctor.users_ok", count = count, path = path).to_string())
    });

    results.push(
        timed("provider", async {
            let provider = match create_provider(&config.llm) {
                Ok(provider) => provider,
                Err(e) => {
                    return CheckResult::Failed(
                        t!("doctor.provider_failed", error = format!("{e:#}")).to_string(),
                    );
                }
            };
            match provider.warmup().await {
                Ok(()) => CheckResult::Ok(
                    t!(
                        "doctor.provider_ok",
                        name = provider.name(),
                        model = provider.model()
                    )
                    .to_string(),
                ),
                Err(e) => CheckResult::Failed(
                    t!("doctor.provider_failed", error = format!("{e:#}")).to_string(),
                ),
            }
        })
        .await,
    );

    if !config.telegram.bot_token.trim().is_empty() {
        let channel = TelegramChannel::new(&config.telegram);
        results.push(
            timed("telegram", async {
                if channel.health_check().await {
                    CheckResult::Ok(t!("doctor.telegram_ok").to_string())
                } else {
                    CheckResult::Failed(t!("doctor.telegram_failed").to_string())
                }
            })
            .await,
        );
    }

    let mut ok = 0_u32;
    let mut failed = 0_u32;
    for result in &results {
        match result {
            CheckResult::Ok(line) => {
                ok += 1;
                println!("  ✅ {line}");
            }
            CheckResult::Failed(line) => {
                failed += 1;
                println!("  ❌ {line}");
            }
        }
    }
    println!();
    println!("{}", t!("doctor.summary", ok = ok, failed = failed));
    Ok(())
}

async fn copilot_login(mut config: Config) -> Result<()> {
    let flow = DeviceFlow::new();
    let code = flow.request_code().await?;
    println!(
        "{}",
        t!(
            "cli.login_prompt",
            uri = code.verification_uri,
            code = code.user_code
        )
    );

    let token = flow.wait_for_token(&code).await?;
    config.llm.github_token = Some(token);
    config.save()?;
    println!(
        "{}",
        t!("cli.login_saved", path = config.config_path.display())
    );
    if config.llm.provider != "copilot" {
        println!("{}", t!("cli.login_provider_hint"));
    }
    Ok(())
}
