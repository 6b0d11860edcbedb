#![doc(test(attr(deny(warnings))))]

//! Trip Ledger records the expenses of a group trip, derives each
//! participant's net balance per currency, and plans the transfers that
//! settle the group.

pub mod config;
pub mod currency;
pub mod errors;
pub mod ledger;
pub mod reports;
pub mod settlement;
pub mod utils;
pub mod validation;

use std::sync::Once;

pub use currency::{CurrencyCode, Money};
pub use errors::{LedgerError, Result};
pub use ledger::{
    Expense, ExpenseCategory, ExpenseId, ExpensePayload, Ledger, ParticipantBalance,
    ParticipantId, Split, TripId, UnsplitPolicy,
};
pub use settlement::{SettlementPlanner, Transfer};
pub use validation::{Rejection, ValidationContext, Violation};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter and emits a startup log.
pub fn init() {
    init_with(&config::Config::default());
}

/// Initializes global tracing with the configured `log_filter`.
///
/// Only the first call in a process takes effect.
pub fn init_with(config: &config::Config) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(config.log_directive());
        tracing::info!(
            filter = config.log_directive().unwrap_or("default"),
            "Trip Ledger tracing initialized."
        );
    });
}
