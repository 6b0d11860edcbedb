use serde::{Deserialize, Serialize};

use super::expense::ParticipantId;
use crate::{
    currency::{CurrencyCode, Money},
    errors::{LedgerError, Result},
};

/// Derived per-participant, per-currency position. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantBalance {
    pub participant_id: ParticipantId,
    pub currency: CurrencyCode,
    pub paid: Money,
    pub owed: Money,
    /// `paid - owed`; positive means the group owes this participant.
    pub net: Money,
}

impl ParticipantBalance {
    pub fn new(
        participant_id: ParticipantId,
        currency: CurrencyCode,
        paid_minor: i64,
        owed_minor: i64,
    ) -> Result<Self> {
        let net = paid_minor
            .checked_sub(owed_minor)
            .ok_or_else(|| LedgerError::AmountOutOfRange {
                currency: currency.clone(),
            })?;
        Ok(Self {
            participant_id,
            paid: Money::new(paid_minor, currency.clone()),
            owed: Money::new(owed_minor, currency.clone()),
            net: Money::new(net, currency.clone()),
            currency,
        })
    }

    /// A balance carrying only a net position, as a planner input.
    pub fn from_net(participant_id: impl Into<ParticipantId>, net: Money) -> Self {
        let currency = net.currency().clone();
        let (paid, owed) = if net.is_negative() {
            (Money::zero(currency.clone()), net.negated())
        } else {
            (net.clone(), Money::zero(currency.clone()))
        };
        Self {
            participant_id: participant_id.into(),
            currency,
            paid,
            owed,
            net,
        }
    }

    /// Within the tolerance: a residue of at most `tolerance_minor` is settled.
    pub fn is_settled(&self, tolerance_minor: i64) -> bool {
        self.net.minor().unsigned_abs() <= tolerance_minor.unsigned_abs()
    }
}
