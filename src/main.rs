use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use sqlx::postgres::PgPoolOptions;
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use imagegen_bot::api::{self, auth::InitDataVerifier, AppState};
use imagegen_bot::bot::{self, DialogueManager};
use imagegen_bot::config::{AppConfig, LogFormat};
use imagegen_bot::db;
use imagegen_bot::dialogue::InMemConversationStore;
use imagegen_bot::generation::PlaceholderGenerator;
use imagegen_bot::localization::init_localization;
use imagegen_bot::seed;
use imagegen_bot::storage::PgStore;

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init(),
        LogFormat::Plain => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init(),
    }
}

fn server_outcome(joined: Result<std::io::Result<()>, JoinError>) -> Result<()> {
    joined
        .context("HTTP server task panicked")?
        .context("HTTP server failed")
}

async fn stop_dispatcher(token: &ShutdownToken) {
    match token.shutdown() {
        Ok(stopped) => stopped.await,
        Err(_) => debug!("Dispatcher was not running"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    init_localization()?;

    info!("Starting image generation bot");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    db::init_database_schema(&pool).await?;

    if config.seed_catalog {
        if let Err(e) = seed::seed_catalog(&pool).await {
            warn!(error = %e, "Catalog seeding failed, continuing with existing data");
        }
    }

    let store = Arc::new(PgStore::new(pool));
    let bot = Bot::new(&config.bot_token);

    let manager = Arc::new(
        DialogueManager::with_store(
            Arc::clone(&store),
            Arc::new(InMemConversationStore::new()),
            Arc::new(PlaceholderGenerator::new(config.generation_latency)),
        )
        .with_generation_timeout(config.generation_timeout),
    );

    let verifier = if config.auth_bind_bot_token {
        InitDataVerifier::for_bot_token(&config.bot_token)?
    } else {
        InitDataVerifier::web_app_data()
    };
    let state = AppState::with_store(store, verifier).with_notifier(Arc::new(bot.clone()));

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    info!(addr = %config.http_addr, "HTTP API listening");

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, api::create_router(state))
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let mut dispatcher = Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![manager])
        .default_handler(|update| async move {
            debug!(update_id = ?update.id, "Ignoring unhandled update");
        })
        .build();
    let dispatcher_shutdown = dispatcher.shutdown_token();
    let dispatcher_task = tokio::spawn(async move { dispatcher.dispatch().await });

    info!("Bot initialized, dispatcher running");

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }

            shutdown.cancel();
            match tokio::time::timeout(config.shutdown_grace, &mut server).await {
                Ok(joined) => server_outcome(joined),
                Err(_) => Err(anyhow!(
                    "HTTP server did not shut down within {:?}",
                    config.shutdown_grace
                )),
            }
        }
        joined = &mut server => {
            error!("HTTP server stopped before shutdown was requested");
            server_outcome(joined).and_then(|()| Err(anyhow!("HTTP server exited unexpectedly")))
        }
    };

    stop_dispatcher(&dispatcher_shutdown).await;
    if let Err(e) = dispatcher_task.await {
        error!(error = %e, "Dispatcher task failed");
    }

    match &outcome {
        Ok(()) => info!("Shutdown complete"),
        Err(e) => error!(error = %e, "Shutdown finished with an error"),
    }

    outcome
}
