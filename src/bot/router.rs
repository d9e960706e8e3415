//! Parsing of inbound updates into events the flow engine understands.
//!
//! Commands and callback payloads are parsed once here; nothing past this
//! module matches on raw strings.

use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

const CATEGORY_PREFIX: &str = "category_";
const TRENDING_PREFIX: &str = "trending_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel,
    Help,
}

impl Command {
    /// Parse `/start`, `/cancel`, `/help`, with or without a `@botname` suffix
    pub fn parse(text: &str) -> Option<Self> {
        let head = text.split_whitespace().next()?;
        let name = head.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        match name {
            "start" => Some(Command::Start),
            "cancel" => Some(Command::Cancel),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Buttons whose payload is a fixed string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum NamedAction {
    GenerateImage,
    MyCredits,
    TrendingPrompts,
    Help,
    BackToMain,
    DepositCredits,
}

/// A callback payload after parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Named(NamedAction),
    /// Raw id suffix of a `category_<id>` payload
    Category(String),
    /// Raw id suffix of a `trending_<id>` payload
    Trending(String),
    Unknown(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        if let Ok(named) = data.parse::<NamedAction>() {
            return CallbackAction::Named(named);
        }

        if let Some(id) = data.strip_prefix(CATEGORY_PREFIX).filter(|id| !id.is_empty()) {
            return CallbackAction::Category(id.to_string());
        }

        if let Some(id) = data.strip_prefix(TRENDING_PREFIX).filter(|id| !id.is_empty()) {
            return CallbackAction::Trending(id.to_string());
        }

        CallbackAction::Unknown(data.to_string())
    }
}

pub fn category_payload(id: Uuid) -> String {
    format!("{CATEGORY_PREFIX}{id}")
}

pub fn trending_payload(id: Uuid) -> String {
    format!("{TRENDING_PREFIX}{id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command(Command),
    Callback(CallbackAction),
    Text(String),
}

impl InboundEvent {
    /// Classify a text message as a known command or free text
    pub fn from_text(text: &str) -> Self {
        match Command::parse(text) {
            Some(command) => InboundEvent::Command(command),
            None => InboundEvent::Text(text.to_string()),
        }
    }

    pub fn from_callback_data(data: &str) -> Self {
        InboundEvent::Callback(CallbackAction::parse(data))
    }

    /// Short label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Command(_) => "command",
            InboundEvent::Callback(_) => "callback",
            InboundEvent::Text(_) => "text",
        }
    }
}
