//! # Storage Error Types Module
//!
//! Errors surfaced by the user, catalog and ledger stores. Validation
//! failures never reach this type; they are rejected by the flow that owns
//! the input (see `deposit::DepositRejection` and
//! `generation::PromptRejection`).

use thiserror::Error;

use crate::models::CreditType;

/// Error returned by every store operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A debit would take the balance below zero
    #[error("insufficient {credit_type} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        credit_type: CreditType,
        available: i64,
        requested: i64,
    },

    /// The new balance does not fit the balance column
    #[error("{credit_type} balance overflow: current {current}, delta {delta}")]
    BalanceOverflow {
        credit_type: CreditType,
        current: i64,
        delta: i64,
    },

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store could not be reached or refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        StoreError::NotFound { entity }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
