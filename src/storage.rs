//! # Storage Module
//!
//! Trait seams over persistent entities. `PgStore` is the production
//! implementation backed by the `db` module; `memory::MemoryStore` keeps
//! everything in process and is what the flow tests run against.

pub mod memory;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::db;
use crate::errors::StoreResult;
use crate::ledger::{AppliedDelta, EntryMeta, LedgerStore};
use crate::models::{
    Category, CreditBalance, CreditType, LedgerEntry, TrendingPrompt, UpsertedUser, User,
    UserProfileInput, UserUpdate,
};

/// Number of prompts shown in the trending list
pub const TRENDING_LIMIT: i64 = 10;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the user on first contact, refresh profile fields afterwards
    async fn upsert_user(&self, profile: &UserProfileInput) -> StoreResult<UpsertedUser>;

    async fn get_user_by_telegram_id(&self, telegram_id: i64) -> StoreResult<User>;

    async fn update_user(&self, telegram_id: i64, update: &UserUpdate) -> StoreResult<User>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active categories ordered by name
    async fn list_active_categories(&self) -> StoreResult<Vec<Category>>;

    async fn get_category(&self, id: Uuid) -> StoreResult<Category>;

    /// Active prompts, most used first
    async fn list_trending_prompts(&self, limit: i64) -> StoreResult<Vec<TrendingPrompt>>;

    async fn get_trending_prompt(&self, id: Uuid) -> StoreResult<TrendingPrompt>;

    /// Bump the use count and last-used timestamp of a prompt
    async fn record_prompt_usage(&self, id: Uuid) -> StoreResult<()>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert_user(&self, profile: &UserProfileInput) -> StoreResult<UpsertedUser> {
        db::upsert_user(&self.pool, profile).await
    }

    async fn get_user_by_telegram_id(&self, telegram_id: i64) -> StoreResult<User> {
        db::get_user_by_telegram_id(&self.pool, telegram_id).await
    }

    async fn update_user(&self, telegram_id: i64, update: &UserUpdate) -> StoreResult<User> {
        db::update_user(&self.pool, telegram_id, update).await
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_active_categories(&self) -> StoreResult<Vec<Category>> {
        db::list_active_categories(&self.pool).await
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Category> {
        db::get_category(&self.pool, id).await
    }

    async fn list_trending_prompts(&self, limit: i64) -> StoreResult<Vec<TrendingPrompt>> {
        db::list_trending_prompts(&self.pool, limit).await
    }

    async fn get_trending_prompt(&self, id: Uuid) -> StoreResult<TrendingPrompt> {
        db::get_trending_prompt(&self.pool, id).await
    }

    async fn record_prompt_usage(&self, id: Uuid) -> StoreResult<()> {
        db::record_prompt_usage(&self.pool, id).await
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn get_balance(&self, user_id: Uuid, credit_type: CreditType) -> StoreResult<i64> {
        db::get_balance(&self.pool, user_id, credit_type).await
    }

    async fn apply_delta(
        &self,
        user_id: Uuid,
        credit_type: CreditType,
        delta: i64,
        meta: EntryMeta,
    ) -> StoreResult<AppliedDelta> {
        db::apply_credit_delta(&self.pool, user_id, credit_type, delta, &meta).await
    }

    async fn balances(&self, user_id: Uuid) -> StoreResult<Vec<CreditBalance>> {
        db::list_balances(&self.pool, user_id).await
    }

    async fn entries(
        &self,
        user_id: Uuid,
        credit_type: CreditType,
    ) -> StoreResult<Vec<LedgerEntry>> {
        db::list_ledger_entries(&self.pool, user_id, credit_type).await
    }
}
