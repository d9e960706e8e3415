//! # Deposit Module
//!
//! Turns a typed deposit amount into image credits. Ten units of currency buy
//! one credit; whatever does not divide evenly is reported back as unused.

use tracing::info;
use uuid::Uuid;

use crate::errors::StoreResult;
use crate::ledger::{EntryMeta, LedgerStore};
use crate::models::{CreditType, TransactionKind};

/// Currency units per image credit, also the minimum deposit
pub const UNITS_PER_CREDIT: i64 = 10;

/// Why a typed amount was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositRejection {
    NotANumber,
    NotPositive,
    BelowMinimum,
}

impl DepositRejection {
    /// Localization key of the re-prompt message
    pub fn message_key(&self) -> &'static str {
        match self {
            DepositRejection::NotANumber => "deposit-invalid-number",
            DepositRejection::NotPositive => "deposit-not-positive",
            DepositRejection::BelowMinimum => "deposit-below-minimum",
        }
    }
}

/// A validated deposit split into credits and remainder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositQuote {
    pub amount: i64,
    pub credits: i64,
    pub remainder: i64,
}

impl DepositQuote {
    /// Portion of the amount that was converted into credits
    pub fn converted_amount(&self) -> i64 {
        self.amount - self.remainder
    }

    /// Description stored on the ledger entry
    pub fn ledger_description(&self) -> String {
        format!(
            "Deposit: {} etb converted to {} credits",
            self.converted_amount(),
            self.credits
        )
    }
}

/// Committed deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub quote: DepositQuote,
    pub new_balance: i64,
    pub entry_id: Uuid,
}

/// Validate raw input as a deposit amount
pub fn parse_deposit_amount(input: &str) -> Result<DepositQuote, DepositRejection> {
    let amount: i64 = input
        .trim()
        .parse()
        .map_err(|_| DepositRejection::NotANumber)?;

    if amount <= 0 {
        return Err(DepositRejection::NotPositive);
    }

    if amount < UNITS_PER_CREDIT {
        return Err(DepositRejection::BelowMinimum);
    }

    Ok(DepositQuote {
        amount,
        credits: amount / UNITS_PER_CREDIT,
        remainder: amount % UNITS_PER_CREDIT,
    })
}

/// Grant the quoted credits as a single purchase entry
pub async fn process_deposit(
    ledger: &dyn LedgerStore,
    user_id: Uuid,
    quote: DepositQuote,
) -> StoreResult<DepositReceipt> {
    let applied = ledger
        .apply_delta(
            user_id,
            CreditType::Image,
            quote.credits,
            EntryMeta::new(TransactionKind::Purchase, quote.ledger_description()),
        )
        .await?;

    info!(
        user_id = %user_id,
        amount = quote.amount,
        credits = quote.credits,
        remainder = quote.remainder,
        new_balance = applied.new_balance,
        "Deposit completed"
    );

    Ok(DepositReceipt {
        quote,
        new_balance: applied.new_balance,
        entry_id: applied.entry_id,
    })
}
