use std::{io, process::ExitCode, sync::Arc, time::Duration};

use channels::{TelegramPoller, TelegramSink, WebhookState};
use clap::Parser;
use frankenstein::AsyncTelegramApi;
use frankenstein::client_reqwest::Bot;
use frankenstein::methods::{DeleteWebhookParams, SetWebhookParams};
use orchestrator::{Counters, Engine, SessionStore};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use types::{BotConfig, ConfigError, DeliveryMode, EventDispatcher, init_tracing};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Parser, PartialEq, Eq)]
#[command(name = "shopsavvy", about = "ShopSavvy deals discovery Telegram bot")]
struct CliArgs {
    /// Override the delivery mode from the environment: `push` or `pull`
    #[arg(long = "mode")]
    mode: Option<String>,
}

#[derive(Debug, Error)]
enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {surface} listener: {source}")]
    Bind {
        surface: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{surface} server terminated: {source}")]
    Serve {
        surface: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("telegram {action} failed: {message}")]
    Telegram {
        action: &'static str,
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(error) = run().await {
        eprintln!("shopsavvy error: {error}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<(), BotError> {
    init_tracing();
    let args = CliArgs::parse();
    let config = load_config(&args)?;

    let store = Arc::new(SessionStore::new());
    let counters = Arc::new(Counters::new());
    let sink = Arc::new(TelegramSink::new(&config.bot_token));
    let cancel = CancellationToken::new();
    // Workers idle out on the same TTL as their sessions.
    let idle_ttl = Duration::from_secs(config.session_idle_ttl_secs);
    let engine = Engine::new(
        Arc::clone(&store),
        Arc::clone(&counters),
        sink,
        cancel.clone(),
        idle_ttl,
    );

    spawn_shutdown_watcher(cancel.clone());
    let sweeper = spawn_idle_sweeper(Arc::clone(&store), idle_ttl, cancel.clone());

    let status_listener = status::bind(&config.listen.host, config.listen.status_port)
        .await
        .map_err(|source| BotError::Bind {
            surface: "status",
            source,
        })?;
    let status_app = status::router(status::StatusState::new(Arc::clone(&counters)));
    let status_cancel = cancel.clone();
    let status_server: JoinHandle<Result<(), BotError>> = tokio::spawn(async move {
        status::serve(status_listener, status_app, status_cancel)
            .await
            .map_err(|source| BotError::Serve {
                surface: "status",
                source,
            })
    });

    let bot = Bot::new(&config.bot_token);
    let dispatcher: Arc<dyn EventDispatcher> = Arc::new(engine.clone());

    match config.mode {
        DeliveryMode::Push => {
            register_webhook(&bot, &config).await?;
            let state = WebhookState::new(
                dispatcher,
                config.webhook.secret.clone(),
                Some(bot.clone()),
            );
            let app = channels::router(&config.webhook_path(), state);
            let listener = channels::bind(&config.listen.host, config.listen.port)
                .await
                .map_err(|source| BotError::Bind {
                    surface: "webhook",
                    source,
                })?;
            info!(mode = "push", "shopsavvy started");
            channels::serve(listener, app, cancel.clone())
                .await
                .map_err(|source| BotError::Serve {
                    surface: "webhook",
                    source,
                })?;
        }
        DeliveryMode::Pull => {
            deregister_webhook(&bot).await?;
            info!(mode = "pull", "shopsavvy started");
            let poller = TelegramPoller::new(bot, dispatcher, config.poll_timeout_secs);
            poller.run(cancel.clone()).await;
        }
    }

    // Serving has stopped; let the per-user workers flush their mailboxes.
    engine.drain().await;
    let _ = sweeper.await;
    if let Ok(result) = status_server.await {
        result?;
    }

    info!("shopsavvy stopped");
    Ok(())
}

fn load_config(args: &CliArgs) -> Result<BotConfig, BotError> {
    let mut config = BotConfig::from_env()?;
    if let Some(raw) = args.mode.as_deref() {
        config.mode = parse_mode(raw)?;
        // The override can flip a pull config into push; re-check coherence.
        config.validate()?;
    }
    Ok(config)
}

fn parse_mode(raw: &str) -> Result<DeliveryMode, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "push" => Ok(DeliveryMode::Push),
        "pull" => Ok(DeliveryMode::Pull),
        _ => Err(ConfigError::InvalidMode {
            value: raw.to_owned(),
        }),
    }
}

async fn register_webhook(bot: &Bot, config: &BotConfig) -> Result<(), BotError> {
    let url = config.webhook_url().ok_or(BotError::Config(
        ConfigError::MissingWebhookUrl,
    ))?;
    let builder = SetWebhookParams::builder().url(url.clone());
    let params = match &config.webhook.secret {
        Some(secret) => builder.secret_token(secret.clone()).build(),
        None => builder.build(),
    };
    bot.set_webhook(&params)
        .await
        .map_err(|error| BotError::Telegram {
            action: "set_webhook",
            message: error.to_string(),
        })?;
    info!(url = %url, "webhook registered");
    Ok(())
}

/// Pull mode and a registered webhook are mutually exclusive server-side, so
/// clear any stale registration before polling.
async fn deregister_webhook(bot: &Bot) -> Result<(), BotError> {
    let params = DeleteWebhookParams::builder()
        .drop_pending_updates(false)
        .build();
    bot.delete_webhook(&params)
        .await
        .map_err(|error| BotError::Telegram {
            action: "delete_webhook",
            message: error.to_string(),
        })?;
    Ok(())
}

fn spawn_shutdown_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("failed to install ctrl-c handler; shutdown only via SIGKILL");
            return;
        }
        info!("shutdown signal received");
        cancel.cancel();
    });
}

fn spawn_idle_sweeper(
    store: Arc<SessionStore>,
    ttl: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let swept = store.sweep_idle(ttl).await;
                    if swept > 0 {
                        info!(swept, "idle sessions evicted");
                    }
                }
            }
        }
    })
}
