//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `router`: Parses commands and callback payloads into inbound events
//! - `dialogue_manager`: Runs the conversation flows and produces replies
//! - `message_handler`: Teloxide endpoint for text messages
//! - `callback_handler`: Teloxide endpoint for inline keyboard callback queries
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod router;
pub mod ui_builder;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;
use thiserror::Error;

use crate::models::UserProfileInput;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use dialogue_manager::DialogueManager;
pub use message_handler::message_handler;
pub use router::{CallbackAction, Command, InboundEvent, NamedAction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("update has no sender")]
    MissingSender,
}

/// Identity of the Telegram user behind an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl Sender {
    pub fn profile(&self) -> UserProfileInput {
        UserProfileInput {
            telegram_id: self.telegram_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone().unwrap_or_default(),
            username: self.username.clone(),
            photo_url: None,
            lang: None,
        }
    }

    pub fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}

impl From<&teloxide::types::User> for Sender {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            telegram_id: user.id.0 as i64,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Post a new message
    Send,
    /// Replace the message the pressed button belongs to
    Edit,
}

/// Message the flow wants shown to the user
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
    pub mode: ReplyMode,
}

impl Reply {
    pub fn send(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            mode: ReplyMode::Send,
        }
    }

    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            mode: ReplyMode::Edit,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Update handler tree; the dispatcher supplies `Arc<DialogueManager>`
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler))
}
