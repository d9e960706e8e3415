use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{FromRow, Row};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{StoreError, StoreResult};
use crate::ledger::{complete_balances, AppliedDelta, EntryMeta};
use crate::models::{
    Category, CreditBalance, CreditType, LedgerEntry, TrendingPrompt, UpsertedUser, User,
    UserProfileInput, UserUpdate,
};

const USER_COLUMNS: &str = "id, telegram_id, first_name, last_name, telegram_username, image, \
     lang, role, is_deactivated, last_login, created_at, updated_at";

const TRENDING_SELECT: &str = "SELECT tp.id, tp.prompt, tp.category_id, c.emoji AS category_emoji, \
     tp.use_count, tp.is_active, tp.last_used_at \
     FROM trending_prompts tp JOIN categories c ON c.id = tp.category_id";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            telegram_id BIGINT NOT NULL UNIQUE,
            first_name VARCHAR(100) NOT NULL DEFAULT '',
            last_name VARCHAR(100) NOT NULL DEFAULT '',
            telegram_username VARCHAR(100),
            image VARCHAR(255),
            lang VARCHAR(10) NOT NULL DEFAULT 'en',
            role VARCHAR(20) NOT NULL DEFAULT 'user',
            is_deactivated BOOLEAN NOT NULL DEFAULT FALSE,
            last_login TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY,
            name VARCHAR(100) NOT NULL UNIQUE,
            description VARCHAR(500) NOT NULL DEFAULT '',
            emoji VARCHAR(50) NOT NULL DEFAULT '',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_credits (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id),
            credit_type VARCHAR(20) NOT NULL,
            balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, credit_type)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_credits table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS credit_transactions (
            id UUID PRIMARY KEY,
            seq BIGSERIAL NOT NULL,
            user_id UUID NOT NULL REFERENCES users(id),
            credit_type VARCHAR(20) NOT NULL,
            amount BIGINT NOT NULL,
            kind VARCHAR(20) NOT NULL,
            description VARCHAR(500) NOT NULL DEFAULT '',
            balance_after BIGINT NOT NULL,
            reference_id VARCHAR(100),
            payment_provider VARCHAR(50),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create credit_transactions table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS credit_transactions_user_type_idx
         ON credit_transactions (user_id, credit_type, seq)",
    )
    .execute(pool)
    .await
    .context("Failed to create credit_transactions index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS trending_prompts (
            id UUID PRIMARY KEY,
            prompt VARCHAR(500) NOT NULL UNIQUE,
            category_id UUID NOT NULL REFERENCES categories(id),
            use_count BIGINT NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            last_used_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create trending_prompts table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Create the user on first contact or refresh the profile afterwards.
///
/// New users get a zero balance record for every credit type in the same
/// transaction. The stored locale is only set on creation.
pub async fn upsert_user(pool: &PgPool, profile: &UserProfileInput) -> StoreResult<UpsertedUser> {
    let mut tx = pool.begin().await?;

    let row: PgRow = sqlx::query(&format!(
        "INSERT INTO users (id, telegram_id, first_name, last_name, telegram_username, image, lang, last_login)
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'en'), NOW())
         ON CONFLICT (telegram_id) DO UPDATE SET
             first_name = EXCLUDED.first_name,
             last_name = EXCLUDED.last_name,
             telegram_username = COALESCE(EXCLUDED.telegram_username, users.telegram_username),
             image = COALESCE(EXCLUDED.image, users.image),
             last_login = NOW(),
             updated_at = NOW()
         RETURNING {USER_COLUMNS}, (xmax = 0) AS inserted"
    ))
    .bind(Uuid::new_v4())
    .bind(profile.telegram_id)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.username)
    .bind(&profile.photo_url)
    .bind(&profile.lang)
    .fetch_one(&mut *tx)
    .await?;

    let user = User::from_row(&row)?;
    let created: bool = row.try_get("inserted")?;

    if created {
        for credit_type in CreditType::iter() {
            sqlx::query(
                "INSERT INTO user_credits (id, user_id, credit_type, balance)
                 VALUES ($1, $2, $3, 0)
                 ON CONFLICT (user_id, credit_type) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(user.id)
            .bind(credit_type.as_ref())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    if created {
        info!(telegram_id = user.telegram_id, user_id = %user.id, "Created new user");
    } else {
        debug!(telegram_id = user.telegram_id, user_id = %user.id, "Refreshed existing user");
    }

    Ok(UpsertedUser { user, created })
}

pub async fn get_user_by_telegram_id(pool: &PgPool, telegram_id: i64) -> StoreResult<User> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1 AND deleted_at IS NULL"
    ))
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found("user"))
}

/// Apply a partial profile update; blank fields are ignored
pub async fn update_user(pool: &PgPool, telegram_id: i64, update: &UserUpdate) -> StoreResult<User> {
    let update = update.normalized();

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
             first_name = COALESCE($2, first_name),
             last_name = COALESCE($3, last_name),
             lang = COALESCE($4, lang),
             updated_at = NOW()
         WHERE telegram_id = $1 AND deleted_at IS NULL
         RETURNING {USER_COLUMNS}"
    ))
    .bind(telegram_id)
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(&update.lang)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found("user"))?;

    info!(telegram_id, "User profile updated");
    Ok(user)
}

pub async fn list_active_categories(pool: &PgPool) -> StoreResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, description, emoji, is_active
         FROM categories WHERE is_active = TRUE ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

pub async fn get_category(pool: &PgPool, id: Uuid) -> StoreResult<Category> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, description, emoji, is_active FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found("category"))
}

pub async fn list_trending_prompts(pool: &PgPool, limit: i64) -> StoreResult<Vec<TrendingPrompt>> {
    let prompts = sqlx::query_as::<_, TrendingPrompt>(&format!(
        "{TRENDING_SELECT} WHERE tp.is_active = TRUE
         ORDER BY tp.use_count DESC, tp.prompt ASC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(prompts)
}

pub async fn get_trending_prompt(pool: &PgPool, id: Uuid) -> StoreResult<TrendingPrompt> {
    sqlx::query_as::<_, TrendingPrompt>(&format!("{TRENDING_SELECT} WHERE tp.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::not_found("trending prompt"))
}

pub async fn record_prompt_usage(pool: &PgPool, id: Uuid) -> StoreResult<()> {
    let rows_affected = sqlx::query(
        "UPDATE trending_prompts
         SET use_count = use_count + 1, last_used_at = NOW(), updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(StoreError::not_found("trending prompt"));
    }

    debug!(prompt_id = %id, "Recorded trending prompt usage");
    Ok(())
}

pub async fn get_balance(pool: &PgPool, user_id: Uuid, credit_type: CreditType) -> StoreResult<i64> {
    let balance: Option<i64> = sqlx::query_scalar(
        "SELECT balance FROM user_credits WHERE user_id = $1 AND credit_type = $2",
    )
    .bind(user_id)
    .bind(credit_type.as_ref())
    .fetch_optional(pool)
    .await?;

    Ok(balance.unwrap_or(0))
}

/// Change a balance and append its ledger entry in one transaction.
///
/// The balance row is created if missing and locked with `FOR UPDATE`, so two
/// concurrent deltas for the same pair serialize instead of overwriting each
/// other.
pub async fn apply_credit_delta(
    pool: &PgPool,
    user_id: Uuid,
    credit_type: CreditType,
    delta: i64,
    meta: &EntryMeta,
) -> StoreResult<AppliedDelta> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO user_credits (id, user_id, credit_type, balance)
         VALUES ($1, $2, $3, 0)
         ON CONFLICT (user_id, credit_type) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(credit_type.as_ref())
    .execute(&mut *tx)
    .await?;

    let current: i64 = sqlx::query_scalar(
        "SELECT balance FROM user_credits
         WHERE user_id = $1 AND credit_type = $2
         FOR UPDATE",
    )
    .bind(user_id)
    .bind(credit_type.as_ref())
    .fetch_one(&mut *tx)
    .await?;

    let Some(new_balance) = current.checked_add(delta) else {
        tx.rollback().await?;
        warn!(user_id = %user_id, %credit_type, current, delta, "Rejected delta past balance limit");
        return Err(StoreError::BalanceOverflow {
            credit_type,
            current,
            delta,
        });
    };
    if new_balance < 0 {
        tx.rollback().await?;
        warn!(user_id = %user_id, %credit_type, current, delta, "Rejected debit beyond balance");
        return Err(StoreError::InsufficientBalance {
            credit_type,
            available: current,
            requested: delta.saturating_neg(),
        });
    }

    sqlx::query(
        "UPDATE user_credits SET balance = $3, updated_at = NOW()
         WHERE user_id = $1 AND credit_type = $2",
    )
    .bind(user_id)
    .bind(credit_type.as_ref())
    .bind(new_balance)
    .execute(&mut *tx)
    .await?;

    let entry_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO credit_transactions
             (id, user_id, credit_type, amount, kind, description, balance_after, reference_id, payment_provider)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(entry_id)
    .bind(user_id)
    .bind(credit_type.as_ref())
    .bind(delta)
    .bind(meta.kind.as_ref())
    .bind(&meta.description)
    .bind(new_balance)
    .bind(&meta.reference_id)
    .bind(&meta.payment_provider)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        user_id = %user_id,
        %credit_type,
        delta,
        new_balance,
        entry_id = %entry_id,
        "Ledger entry committed"
    );

    Ok(AppliedDelta {
        new_balance,
        entry_id,
    })
}

pub async fn list_balances(pool: &PgPool, user_id: Uuid) -> StoreResult<Vec<CreditBalance>> {
    let found = sqlx::query_as::<_, CreditBalance>(
        "SELECT user_id, credit_type, balance FROM user_credits WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(complete_balances(user_id, found))
}

pub async fn list_ledger_entries(
    pool: &PgPool,
    user_id: Uuid,
    credit_type: CreditType,
) -> StoreResult<Vec<LedgerEntry>> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        "SELECT id, user_id, credit_type, amount, kind, description, balance_after,
                reference_id, payment_provider, created_at
         FROM credit_transactions
         WHERE user_id = $1 AND credit_type = $2
         ORDER BY seq ASC",
    )
    .bind(user_id)
    .bind(credit_type.as_ref())
    .fetch_all(pool)
    .await?;

    Ok(entries)
}
