//! # Data Model Module
//!
//! Entities persisted by the stores: users, credit balances, ledger entries,
//! categories and trending prompts. Rows map directly onto these structs via
//! `sqlx::FromRow`; string-backed enums round-trip through `strum`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Kind of prepaid credit. Every balance and ledger operation is scoped by it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CreditType {
    Image,
    Video,
}

impl TryFrom<String> for CreditType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Category tag of a ledger entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Usage,
    Refund,
}

impl TryFrom<String> for TransactionKind {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A bot or Mini App user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub telegram_username: Option<String>,
    pub image: Option<String>,
    pub lang: String,
    pub role: String,
    pub is_deactivated: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity fields refreshed on every contact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfileInput {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub lang: Option<String>,
}

/// Partial update from the Mini App; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub lang: Option<String>,
}

impl UserUpdate {
    /// Drop blank fields so they leave the stored value untouched
    pub fn normalized(&self) -> UserUpdate {
        fn keep(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        UserUpdate {
            first_name: keep(&self.first_name),
            last_name: keep(&self.last_name),
            lang: keep(&self.lang),
        }
    }
}

/// Result of an upsert, telling the caller whether the user is new
#[derive(Debug, Clone)]
pub struct UpsertedUser {
    pub user: User,
    pub created: bool,
}

/// Authoritative balance for one (user, credit type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditBalance {
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub credit_type: CreditType,
    pub balance: i64,
}

/// Immutable audit record of a balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub credit_type: CreditType,
    pub amount: i64,
    #[sqlx(try_from = "String")]
    pub kind: TransactionKind,
    pub description: String,
    pub balance_after: i64,
    pub reference_id: Option<String>,
    pub payment_provider: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub emoji: String,
    pub is_active: bool,
}

impl Category {
    /// Emoji shown on buttons, with a palette fallback for blank entries
    pub fn display_emoji(&self) -> &str {
        if self.emoji.is_empty() {
            "🎨"
        } else {
            &self.emoji
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrendingPrompt {
    pub id: Uuid,
    pub prompt: String,
    pub category_id: Uuid,
    pub category_emoji: String,
    pub use_count: i64,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_credit_type_round_trip_through_text() {
        assert_eq!(CreditType::Image.as_ref(), "image");
        assert_eq!(CreditType::Video.to_string(), "video");
        assert_eq!(CreditType::try_from("image".to_string()).unwrap(), CreditType::Image);
        assert!(CreditType::try_from("audio".to_string()).is_err());
        assert_eq!(CreditType::iter().count(), 2);
    }

    #[test]
    fn test_transaction_kind_serialization() {
        assert_eq!(TransactionKind::Purchase.as_ref(), "purchase");
        assert_eq!(
            serde_json::to_string(&TransactionKind::Refund).unwrap(),
            "\"refund\""
        );
    }

    #[test]
    fn test_user_update_ignores_blank_fields() {
        let update = UserUpdate {
            first_name: Some("  ".to_string()),
            last_name: Some(" Bekele ".to_string()),
            lang: None,
        };

        let normalized = update.normalized();

        assert_eq!(normalized.first_name, None);
        assert_eq!(normalized.last_name.as_deref(), Some("Bekele"));
        assert_eq!(normalized.lang, None);
    }

    #[test]
    fn test_category_display_emoji_fallback() {
        let mut category = Category {
            id: Uuid::new_v4(),
            name: "Food".to_string(),
            description: String::new(),
            emoji: String::new(),
            is_active: true,
        };
        assert_eq!(category.display_emoji(), "🎨");

        category.emoji = "🍰".to_string();
        assert_eq!(category.display_emoji(), "🍰");
    }
}
