//! Route handlers.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::models::{CreditBalance, CreditType, User, UserUpdate};
use crate::storage::TRENDING_LIMIT;

use super::error::ApiError;
use super::{AppState, SERVICE_NAME};

type ApiResult = Result<Json<Value>, ApiError>;

/// User record with its balances attached
#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub user_credits: Vec<CreditBalance>,
}

fn telegram_id_param(params: &HashMap<String, String>) -> Result<i64, ApiError> {
    let raw = params
        .get("telegram_id")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("telegram_id is required".to_string()))?;

    raw.parse()
        .map_err(|_| ApiError::BadRequest("telegram_id must be an integer".to_string()))
}

async fn user_view(state: &AppState, user: User) -> Result<UserView, ApiError> {
    let user_credits = state.ledger.balances(user.id).await?;
    Ok(UserView { user, user_credits })
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

pub async fn telegram_auth(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let init_data = params
        .get("initData")
        .filter(|v| !v.is_empty())
        .ok_or(super::auth::AuthError::MissingInitData)?;

    let telegram_user = state.verifier.verify(init_data)?;
    let upserted = state.users.upsert_user(&telegram_user.profile()).await?;

    if upserted.created {
        info!(user_id = telegram_user.id, "User created from Mini App session");
        if let Some(notifier) = &state.notifier {
            if let Err(e) = notifier
                .send_welcome(telegram_user.id, telegram_user.language_code.as_deref())
                .await
            {
                warn!(user_id = telegram_user.id, error = %e, "Failed to send welcome message");
            }
        }
    }

    let view = user_view(&state, upserted.user).await?;
    Ok(Json(json!({
        "message": "Authentication successful",
        "user": view
    })))
}

pub async fn get_current_user(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let telegram_id = telegram_id_param(&params)?;
    let user = state.users.get_user_by_telegram_id(telegram_id).await?;

    let view = user_view(&state, user).await?;
    Ok(Json(json!({ "user": view })))
}

pub async fn update_current_user(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> ApiResult {
    let telegram_id = telegram_id_param(&params)?;
    let Json(update) = body.map_err(|e| {
        warn!(error = %e, "Rejected user update body");
        ApiError::BadRequest("Invalid request data".to_string())
    })?;

    let user = state.users.update_user(telegram_id, &update).await?;
    info!(user_id = telegram_id, "User profile updated");

    let view = user_view(&state, user).await?;
    Ok(Json(json!({
        "message": "User updated successfully",
        "user": view
    })))
}

pub async fn get_user_credits(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let telegram_id = telegram_id_param(&params)?;
    let user = state.users.get_user_by_telegram_id(telegram_id).await?;
    let credits = state.ledger.balances(user.id).await?;

    Ok(Json(json!({ "credits": credits })))
}

pub async fn get_user_transactions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let telegram_id = telegram_id_param(&params)?;
    let credit_type = match params.get("credit_type") {
        Some(raw) => CreditType::from_str(raw)
            .map_err(|_| ApiError::BadRequest(format!("unknown credit_type: {raw}")))?,
        None => CreditType::Image,
    };

    let user = state.users.get_user_by_telegram_id(telegram_id).await?;
    let transactions = state.ledger.entries(user.id, credit_type).await?;

    Ok(Json(json!({ "transactions": transactions })))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult {
    let categories = state.catalog.list_active_categories().await?;
    Ok(Json(json!({ "categories": categories })))
}

pub async fn list_trending_prompts(State(state): State<AppState>) -> ApiResult {
    let trending_prompts = state.catalog.list_trending_prompts(TRENDING_LIMIT).await?;
    Ok(Json(json!({ "trending_prompts": trending_prompts })))
}
