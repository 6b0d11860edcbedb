use thiserror::Error;

use crate::currency::CurrencyCode;
use crate::ledger::ExpenseId;
use crate::validation::Rejection;

/// Error type that captures ledger and settlement failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid expense: {0}")]
    InvalidExpense(Rejection),
    #[error("Expense not found: {0}")]
    NotFound(ExpenseId),
    #[error("Expense already recorded: {0}")]
    DuplicateExpense(ExpenseId),
    #[error("Mixed currencies: expected {expected}, found {found}")]
    MixedCurrency {
        expected: CurrencyCode,
        found: CurrencyCode,
    },
    #[error("Amount out of range in {currency}")]
    AmountOutOfRange { currency: CurrencyCode },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
