//! Trip expense records and the per-trip ledger that balances them.

pub mod balance;
pub mod category;
pub mod expense;
#[allow(clippy::module_inception)]
pub mod ledger;
pub mod payload;

pub use balance::ParticipantBalance;
pub use category::{ExpenseCategory, UnknownCategory};
pub use expense::{Expense, ExpenseId, ParticipantId, Split, TripId};
pub use ledger::{Ledger, UnsplitPolicy};
pub use payload::{AmountInput, ExpensePayload, SplitPayload};
