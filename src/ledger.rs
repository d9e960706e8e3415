//! # Credit Ledger Module
//!
//! Balances only change through [`LedgerStore::apply_delta`], which writes the
//! new balance and its audit entry as one atomic unit. For every
//! (user, credit type) the sum of entry amounts equals the stored balance.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreResult;
use crate::models::{CreditBalance, CreditType, LedgerEntry, TransactionKind};

/// Descriptive part of a ledger entry supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMeta {
    pub kind: TransactionKind,
    pub description: String,
    pub reference_id: Option<String>,
    pub payment_provider: Option<String>,
}

impl EntryMeta {
    pub fn new(kind: TransactionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            reference_id: None,
            payment_provider: None,
        }
    }
}

/// Outcome of a committed delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedDelta {
    pub new_balance: i64,
    pub entry_id: Uuid,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance; a missing record reads as zero
    async fn get_balance(&self, user_id: Uuid, credit_type: CreditType) -> StoreResult<i64>;

    /// Atomically add `delta` to the balance and append the matching entry.
    ///
    /// Fails with `InsufficientBalance` when the result would be negative and
    /// with `BalanceOverflow` when it does not fit an `i64`. Nothing is
    /// written in either case.
    async fn apply_delta(
        &self,
        user_id: Uuid,
        credit_type: CreditType,
        delta: i64,
        meta: EntryMeta,
    ) -> StoreResult<AppliedDelta>;

    /// One record per credit type, zero for types never credited
    async fn balances(&self, user_id: Uuid) -> StoreResult<Vec<CreditBalance>>;

    /// Entries for the pair, oldest first
    async fn entries(&self, user_id: Uuid, credit_type: CreditType)
        -> StoreResult<Vec<LedgerEntry>>;
}

/// Fill in zero balances for credit types that have no record yet
pub fn complete_balances(user_id: Uuid, mut found: Vec<CreditBalance>) -> Vec<CreditBalance> {
    use strum::IntoEnumIterator;

    for credit_type in CreditType::iter() {
        if !found.iter().any(|b| b.credit_type == credit_type) {
            found.push(CreditBalance {
                user_id,
                credit_type,
                balance: 0,
            });
        }
    }
    found.sort_by_key(|b| b.credit_type);
    found
}
