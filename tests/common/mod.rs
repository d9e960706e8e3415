//! Shared fixtures for the flow and API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use imagegen_bot::bot::{DialogueManager, InboundEvent, Reply, Sender};
use imagegen_bot::dialogue::InMemConversationStore;
use imagegen_bot::generation::PlaceholderGenerator;
use imagegen_bot::storage::memory::MemoryStore;

pub const TEST_USER_ID: i64 = 424242;

pub fn sender() -> Sender {
    Sender {
        telegram_id: TEST_USER_ID,
        first_name: "Abebe".to_string(),
        last_name: Some("Kebede".to_string()),
        username: Some("abebe_k".to_string()),
        language_code: Some("en".to_string()),
    }
}

/// Manager wired to in-memory stores and a near-instant generator
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub conversations: Arc<InMemConversationStore>,
    pub manager: Arc<DialogueManager>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let conversations = Arc::new(InMemConversationStore::new());
        let manager = Arc::new(DialogueManager::with_store(
            Arc::clone(&store),
            conversations.clone(),
            Arc::new(PlaceholderGenerator::new(Duration::from_millis(1))),
        ));

        Self {
            store,
            conversations,
            manager,
        }
    }

    pub async fn text(&self, text: &str) -> Option<Reply> {
        self.manager
            .dispatch(Some(&sender()), InboundEvent::from_text(text))
            .await
            .expect("sender is present")
    }

    pub async fn press(&self, data: &str) -> Option<Reply> {
        self.manager
            .dispatch(Some(&sender()), InboundEvent::from_callback_data(data))
            .await
            .expect("sender is present")
    }
}

/// Every callback payload carried by a reply's keyboard
pub fn callback_payloads(reply: &Reply) -> Vec<String> {
    use teloxide::types::InlineKeyboardButtonKind;

    reply
        .keyboard
        .iter()
        .flat_map(|k| k.inline_keyboard.iter().flatten())
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}
