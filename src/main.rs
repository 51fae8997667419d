mod bot;
mod config;
mod fetch;
mod platform;
mod reaction;
mod triggers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::{AppState, Command};
use crate::config::Config;
use crate::fetch::{HttpPageSource, JMENTAPE_URL};
use crate::reaction::{RateLimiter, ReactionEngine};
use crate::triggers::TriggerTables;

const LOG_FILE: &str = "nanoybot.log";

#[derive(Parser, Debug)]
#[command(name = "nanoybot", version, about = "Nanoy Telegram bot. It's only me speaking.")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum Mode {
    /// Run in blocking mode, warnings and errors go to nanoybot.log
    Exec,
    /// Run in blocking mode with debug output on stderr
    Debug,
}

fn init_logging(mode: Mode) -> Result<Option<WorkerGuard>> {
    match mode {
        Mode::Debug => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "debug".into()),
                )
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            Ok(None)
        }
        Mode::Exec => {
            let log_path = std::env::current_dir()
                .context("Unable to resolve working directory")?
                .join(LOG_FILE);
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "warn".into()),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = cli.mode.unwrap_or(Mode::Exec);
    let _log_guard = init_logging(mode)?;

    info!("Loading configuration from: {}", cli.config.display());
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let tables = TriggerTables::from_config(config.triggers.clone())
        .context("Invalid [triggers] section")?;

    info!("Configuration loaded");
    info!("  Allowed chats: {:?}", config.allowed_chats);
    info!("  Rate: {}s", config.rate_seconds);
    info!(
        "  Dictionary: {} ({} words)",
        config.use_dictionary,
        config.allowed_words.len()
    );

    let bot = Bot::new(&config.token);
    let me = bot.get_me().await.context("Unable to grab bot")?;
    info!("Bot {} grabbed.", me.username());

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let config = Arc::new(config);
    let limiter = RateLimiter::starting_at(chrono::Utc::now().timestamp());
    let engine = ReactionEngine::new(config.clone(), tables, limiter);
    let page_source = HttpPageSource::new(JMENTAPE_URL).context("Failed to build HTTP client")?;
    let state = Arc::new(AppState::new(
        config,
        engine,
        Box::new(page_source),
        me.username(),
    ));

    info!("Bot is starting...");
    platform::telegram::run(state, bot).await?;

    Ok(())
}
