use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::ExpenseCategory;
use crate::currency::Money;

/// Identifies the trip a ledger belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripId(pub String);

impl TripId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TripId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifies a trip participant. Ordering doubles as the settlement tie-break.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpenseId(pub Uuid);

impl ExpenseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExpenseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One participant's share of an expense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Split {
    pub participant_id: ParticipantId,
    pub amount_owed: Money,
    pub amount_paid: Money,
}

impl Split {
    pub fn new(participant_id: impl Into<ParticipantId>, amount_owed: Money) -> Self {
        let amount_paid = Money::zero(amount_owed.currency().clone());
        Self {
            participant_id: participant_id.into(),
            amount_owed,
            amount_paid,
        }
    }

    pub fn with_paid(mut self, amount_paid: Money) -> Self {
        self.amount_paid = amount_paid;
        self
    }

    /// Shares `amount` across `participants` so the splits sum exactly to it.
    ///
    /// Repeated participants are ignored; odd minor units go to the earliest
    /// listed participants.
    pub fn even<I, P>(amount: &Money, participants: I) -> Vec<Split>
    where
        I: IntoIterator<Item = P>,
        P: Into<ParticipantId>,
    {
        let mut seen = BTreeSet::new();
        let unique: Vec<ParticipantId> = participants
            .into_iter()
            .map(Into::into)
            .filter(|participant: &ParticipantId| seen.insert(participant.clone()))
            .collect();
        let shares = amount.split_evenly(unique.len());
        unique
            .into_iter()
            .zip(shares)
            .map(|(participant, share)| Split::new(participant, share))
            .collect()
    }
}

/// A single contribution by one payer, optionally split across participants.
///
/// Records are immutable once stored in a ledger; an edit replaces the whole
/// value under the same id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Expense {
    pub id: ExpenseId,
    pub trip_id: TripId,
    pub payer_id: ParticipantId,
    pub amount: Money,
    pub description: String,
    pub category: ExpenseCategory,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub splits: Vec<Split>,
}

impl Expense {
    pub fn new(
        trip_id: impl Into<TripId>,
        payer_id: impl Into<ParticipantId>,
        amount: Money,
        description: impl Into<String>,
        category: ExpenseCategory,
    ) -> Self {
        Self {
            id: ExpenseId::new(),
            trip_id: trip_id.into(),
            payer_id: payer_id.into(),
            amount,
            description: description.into(),
            category,
            created_at: Utc::now(),
            splits: Vec::new(),
        }
    }

    pub fn with_splits(mut self, splits: Vec<Split>) -> Self {
        self.splits = splits;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn has_splits(&self) -> bool {
        !self.splits.is_empty()
    }

    /// Strips surrounding whitespace from every id the record carries.
    pub fn with_trimmed_ids(mut self) -> Self {
        self.trip_id = TripId::new(self.trip_id.as_str().trim());
        self.payer_id = ParticipantId::new(self.payer_id.as_str().trim());
        for split in &mut self.splits {
            split.participant_id = ParticipantId::new(split.participant_id.as_str().trim());
        }
        self
    }

    /// Payer plus everyone named in a split.
    pub fn participants(&self) -> BTreeSet<ParticipantId> {
        std::iter::once(self.payer_id.clone())
            .chain(self.splits.iter().map(|split| split.participant_id.clone()))
            .collect()
    }
}
