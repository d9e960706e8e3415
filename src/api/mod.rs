//! HTTP API for the Telegram Mini App frontend.
//!
//! Exposes the same users, credits and catalog the bot works with. Every
//! route is JSON; errors are `{"error": "..."}` bodies.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use teloxide::prelude::*;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Import localization
use crate::localization::t_lang;

use crate::ledger::LedgerStore;
use crate::storage::{CatalogStore, UserStore};

use auth::InitDataVerifier;

pub const SERVICE_NAME: &str = "imagegen-bot";

/// Greets users whose account was just created from the Mini App
#[async_trait]
pub trait WelcomeNotifier: Send + Sync {
    async fn send_welcome(&self, telegram_id: i64, language_code: Option<&str>) -> anyhow::Result<()>;
}

#[async_trait]
impl WelcomeNotifier for Bot {
    async fn send_welcome(&self, telegram_id: i64, language_code: Option<&str>) -> anyhow::Result<()> {
        self.send_message(ChatId(telegram_id), t_lang("webapp-welcome", language_code))
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub verifier: Arc<InitDataVerifier>,
    pub notifier: Option<Arc<dyn WelcomeNotifier>>,
}

impl AppState {
    /// State whose user, catalog and ledger stores are one backend
    pub fn with_store<S>(store: Arc<S>, verifier: InitDataVerifier) -> Self
    where
        S: UserStore + CatalogStore + LedgerStore + 'static,
    {
        Self {
            users: store.clone(),
            catalog: store.clone(),
            ledger: store,
            verifier: Arc::new(verifier),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn WelcomeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    // Mini App frontend is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/auth/telegram", get(handlers::telegram_auth))
        .route(
            "/api/v1/users/me",
            get(handlers::get_current_user).put(handlers::update_current_user),
        )
        .route("/api/v1/users/me/credits", get(handlers::get_user_credits))
        .route(
            "/api/v1/users/me/transactions",
            get(handlers::get_user_transactions),
        )
        .route("/api/v1/categories", get(handlers::list_categories))
        .route("/api/v1/trending-prompts", get(handlers::list_trending_prompts))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
