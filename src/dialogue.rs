//! Conversation state module tracking which multi-step input a user is in.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the pending text input expected from a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingDepositAmount,
    AwaitingPrompt {
        category_id: Uuid,
    },
}

impl ConversationState {
    /// Stable tag used in logs
    pub fn tag(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingDepositAmount => "awaiting_deposit_amount",
            ConversationState::AwaitingPrompt { .. } => "awaiting_prompt",
        }
    }
}

/// Per-user conversation state keyed by the Telegram user id
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, telegram_id: i64) -> Option<ConversationState>;

    /// Overwrite the state; setting `Idle` removes the entry
    async fn set(&self, telegram_id: i64, state: ConversationState);

    /// Remove the entry and return what was stored
    async fn clear(&self, telegram_id: i64) -> Option<ConversationState>;

    /// Remove the entry only if it still equals `expected`, in one step.
    /// Returns whether it was removed; any other state is left in place.
    async fn clear_if(&self, telegram_id: i64, expected: &ConversationState) -> bool;
}

/// Process-local store; each key is guarded by its own shard lock
#[derive(Debug, Default)]
pub struct InMemConversationStore {
    states: DashMap<i64, ConversationState>,
}

impl InMemConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemConversationStore {
    async fn get(&self, telegram_id: i64) -> Option<ConversationState> {
        self.states.get(&telegram_id).map(|entry| entry.value().clone())
    }

    async fn set(&self, telegram_id: i64, state: ConversationState) {
        if state == ConversationState::Idle {
            self.states.remove(&telegram_id);
        } else {
            self.states.insert(telegram_id, state);
        }
    }

    async fn clear(&self, telegram_id: i64) -> Option<ConversationState> {
        self.states.remove(&telegram_id).map(|(_, state)| state)
    }

    async fn clear_if(&self, telegram_id: i64, expected: &ConversationState) -> bool {
        self.states
            .remove_if(&telegram_id, |_, state| state == expected)
            .is_some()
    }
}
