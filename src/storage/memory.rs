//! In-process implementation of every store trait.
//!
//! All state sits behind one async mutex, so each ledger delta is a single
//! critical section exactly like the database transaction it stands in for.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::{StoreError, StoreResult};
use crate::ledger::{complete_balances, AppliedDelta, EntryMeta, LedgerStore};
use crate::models::{
    Category, CreditBalance, CreditType, LedgerEntry, TrendingPrompt, UpsertedUser, User,
    UserProfileInput, UserUpdate,
};
use crate::storage::{CatalogStore, UserStore};

#[derive(Default)]
struct MemoryState {
    users: HashMap<i64, User>,
    categories: Vec<Category>,
    prompts: Vec<TrendingPrompt>,
    balances: HashMap<(Uuid, CreditType), i64>,
    entries: Vec<LedgerEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category to the catalog and return it
    pub async fn add_category(&self, name: &str, description: &str, emoji: &str) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            emoji: emoji.to_string(),
            is_active: true,
        };
        self.state.lock().await.categories.push(category.clone());
        category
    }

    pub async fn set_category_active(&self, id: Uuid, active: bool) {
        let mut state = self.state.lock().await;
        if let Some(category) = state.categories.iter_mut().find(|c| c.id == id) {
            category.is_active = active;
        }
    }

    /// Add a trending prompt under an existing category
    pub async fn add_trending_prompt(&self, prompt: &str, category: &Category) -> TrendingPrompt {
        let trending = TrendingPrompt {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            category_id: category.id,
            category_emoji: category.emoji.clone(),
            use_count: 0,
            is_active: true,
            last_used_at: None,
        };
        self.state.lock().await.prompts.push(trending.clone());
        trending
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, profile: &UserProfileInput) -> StoreResult<UpsertedUser> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if let Some(user) = state.users.get_mut(&profile.telegram_id) {
            user.first_name = profile.first_name.clone();
            user.last_name = profile.last_name.clone();
            if profile.username.is_some() {
                user.telegram_username = profile.username.clone();
            }
            if profile.photo_url.is_some() {
                user.image = profile.photo_url.clone();
            }
            user.last_login = Some(now);
            user.updated_at = now;
            return Ok(UpsertedUser {
                user: user.clone(),
                created: false,
            });
        }

        let user = User {
            id: Uuid::new_v4(),
            telegram_id: profile.telegram_id,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            telegram_username: profile.username.clone(),
            image: profile.photo_url.clone(),
            lang: profile.lang.clone().unwrap_or_else(|| "en".to_string()),
            role: "user".to_string(),
            is_deactivated: false,
            last_login: Some(now),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.telegram_id, user.clone());

        Ok(UpsertedUser {
            user,
            created: true,
        })
    }

    async fn get_user_by_telegram_id(&self, telegram_id: i64) -> StoreResult<User> {
        self.state
            .lock()
            .await
            .users
            .get(&telegram_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user"))
    }

    async fn update_user(&self, telegram_id: i64, update: &UserUpdate) -> StoreResult<User> {
        let update = update.normalized();
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&telegram_id)
            .ok_or_else(|| StoreError::not_found("user"))?;

        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(lang) = update.lang {
            user.lang = lang;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_active_categories(&self) -> StoreResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Category> {
        self.state
            .lock()
            .await
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("category"))
    }

    async fn list_trending_prompts(&self, limit: i64) -> StoreResult<Vec<TrendingPrompt>> {
        let state = self.state.lock().await;
        let mut prompts: Vec<TrendingPrompt> =
            state.prompts.iter().filter(|p| p.is_active).cloned().collect();
        prompts.sort_by(|a, b| {
            b.use_count
                .cmp(&a.use_count)
                .then_with(|| a.prompt.cmp(&b.prompt))
        });
        prompts.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(prompts)
    }

    async fn get_trending_prompt(&self, id: Uuid) -> StoreResult<TrendingPrompt> {
        self.state
            .lock()
            .await
            .prompts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("trending prompt"))
    }

    async fn record_prompt_usage(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let prompt = state
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("trending prompt"))?;
        prompt.use_count += 1;
        prompt.last_used_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_balance(&self, user_id: Uuid, credit_type: CreditType) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .balances
            .get(&(user_id, credit_type))
            .copied()
            .unwrap_or(0))
    }

    async fn apply_delta(
        &self,
        user_id: Uuid,
        credit_type: CreditType,
        delta: i64,
        meta: EntryMeta,
    ) -> StoreResult<AppliedDelta> {
        let mut state = self.state.lock().await;
        let current = state
            .balances
            .get(&(user_id, credit_type))
            .copied()
            .unwrap_or(0);

        let new_balance = current
            .checked_add(delta)
            .ok_or(StoreError::BalanceOverflow {
                credit_type,
                current,
                delta,
            })?;
        if new_balance < 0 {
            return Err(StoreError::InsufficientBalance {
                credit_type,
                available: current,
                requested: delta.saturating_neg(),
            });
        }

        let entry_id = Uuid::new_v4();
        state.balances.insert((user_id, credit_type), new_balance);
        state.entries.push(LedgerEntry {
            id: entry_id,
            user_id,
            credit_type,
            amount: delta,
            kind: meta.kind,
            description: meta.description,
            balance_after: new_balance,
            reference_id: meta.reference_id,
            payment_provider: meta.payment_provider,
            created_at: Utc::now(),
        });

        Ok(AppliedDelta {
            new_balance,
            entry_id,
        })
    }

    async fn balances(&self, user_id: Uuid) -> StoreResult<Vec<CreditBalance>> {
        let state = self.state.lock().await;
        let found = state
            .balances
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((_, credit_type), balance)| CreditBalance {
                user_id,
                credit_type: *credit_type,
                balance: *balance,
            })
            .collect();
        Ok(complete_balances(user_id, found))
    }

    async fn entries(
        &self,
        user_id: Uuid,
        credit_type: CreditType,
    ) -> StoreResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.credit_type == credit_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;

    #[tokio::test]
    async fn test_debit_beyond_balance_is_rejected() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        store
            .apply_delta(
                user_id,
                CreditType::Image,
                2,
                EntryMeta::new(TransactionKind::Purchase, "grant"),
            )
            .await
            .unwrap();

        let err = store
            .apply_delta(
                user_id,
                CreditType::Image,
                -3,
                EntryMeta::new(TransactionKind::Usage, "spend"),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::InsufficientBalance {
                available: 2,
                requested: 3,
                ..
            }
        ));
        assert_eq!(store.get_balance(user_id, CreditType::Image).await.unwrap(), 2);
        assert_eq!(
            store.entries(user_id, CreditType::Image).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_credit_past_i64_max_is_rejected() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let grant = || EntryMeta::new(TransactionKind::Purchase, "grant");

        store
            .apply_delta(user_id, CreditType::Image, i64::MAX - 1, grant())
            .await
            .unwrap();

        let err = store
            .apply_delta(user_id, CreditType::Image, 2, grant())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::BalanceOverflow {
                current,
                delta: 2,
                ..
            } if current == i64::MAX - 1
        ));
        assert_eq!(
            store.get_balance(user_id, CreditType::Image).await.unwrap(),
            i64::MAX - 1
        );
        assert_eq!(
            store.entries(user_id, CreditType::Image).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_upsert_keeps_identity_and_refreshes_names() {
        let store = MemoryStore::new();
        let profile = UserProfileInput {
            telegram_id: 42,
            first_name: "Abebe".to_string(),
            ..Default::default()
        };

        let first = store.upsert_user(&profile).await.unwrap();
        assert!(first.created);
        assert_eq!(first.user.lang, "en");

        let renamed = UserProfileInput {
            first_name: "Abebe B.".to_string(),
            ..profile
        };
        let second = store.upsert_user(&renamed).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.user.first_name, "Abebe B.");
    }
}
