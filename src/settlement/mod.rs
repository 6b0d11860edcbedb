//! Turns net balances into a short list of point-to-point payments.
//!
//! The planner is a pure function of its input: it keeps no history, so it
//! can be re-run after every ledger mutation and always returns the same
//! transfers for the same balances.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    currency::{CurrencyCode, Money},
    errors::{LedgerError, Result},
    ledger::{ParticipantBalance, ParticipantId},
};

/// One minor unit. A net within this of zero is treated as settled.
pub const DEFAULT_TOLERANCE_MINOR: i64 = 1;

/// A payment from a debtor to a creditor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub amount: Money,
}

/// Greedy largest-to-largest matcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementPlanner {
    tolerance_minor: i64,
}

impl Default for SettlementPlanner {
    fn default() -> Self {
        Self {
            tolerance_minor: DEFAULT_TOLERANCE_MINOR,
        }
    }
}

type Side = BinaryHeap<(i64, Reverse<ParticipantId>)>;

impl SettlementPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below one minor unit are raised to one.
    pub fn with_tolerance(tolerance_minor: i64) -> Self {
        Self {
            tolerance_minor: tolerance_minor.max(DEFAULT_TOLERANCE_MINOR),
        }
    }

    pub fn tolerance(&self) -> i64 {
        self.tolerance_minor
    }

    /// Plans transfers for balances that all share one currency.
    ///
    /// The largest remaining creditor is always paired with the largest
    /// remaining debtor, ties going to the smaller participant id. Each step
    /// settles at least one side, so a balanced input of `n` non-zero
    /// participants yields at most `n - 1` transfers.
    pub fn plan(&self, balances: &[ParticipantBalance]) -> Result<Vec<Transfer>> {
        let Some(currency) = single_currency(balances)? else {
            return Ok(Vec::new());
        };

        let overflow = || LedgerError::AmountOutOfRange {
            currency: currency.clone(),
        };
        let mut nets: BTreeMap<&ParticipantId, i64> = BTreeMap::new();
        for balance in balances {
            let net = nets.entry(&balance.participant_id).or_default();
            *net = net.checked_add(balance.net.minor()).ok_or_else(overflow)?;
        }
        let residue = nets
            .values()
            .try_fold(0i64, |total, net| total.checked_add(*net))
            .ok_or_else(overflow)?;
        if residue.unsigned_abs() > self.tolerance_minor.unsigned_abs() {
            warn!(%currency, residue, "balances do not net to zero");
        }

        // Nets within the tolerance on either side are already settled.
        let mut creditors = Side::new();
        let mut debtors = Side::new();
        for (participant, net) in nets {
            if net > self.tolerance_minor {
                creditors.push((net, Reverse(participant.clone())));
            } else if net < -self.tolerance_minor {
                let owed = net.checked_neg().ok_or_else(overflow)?;
                debtors.push((owed, Reverse(participant.clone())));
            }
        }

        let mut transfers = Vec::new();
        // Once either side runs dry the remainder on the other is slack.
        while let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) =
            (creditors.pop(), debtors.pop())
        {
            let amount = credit.min(debt);
            transfers.push(Transfer {
                from: debtor.clone(),
                to: creditor.clone(),
                amount: Money::new(amount, currency.clone()),
            });
            if credit - amount >= self.tolerance_minor {
                creditors.push((credit - amount, Reverse(creditor)));
            }
            if debt - amount >= self.tolerance_minor {
                debtors.push((debt - amount, Reverse(debtor)));
            }
        }

        debug!(
            %currency,
            participants = balances.len(),
            transfers = transfers.len(),
            "settlement planned"
        );
        Ok(transfers)
    }

    /// Partitions by currency and plans each one independently.
    pub fn plan_all(
        &self,
        balances: &[ParticipantBalance],
    ) -> Result<BTreeMap<CurrencyCode, Vec<Transfer>>> {
        let mut by_currency: BTreeMap<CurrencyCode, Vec<ParticipantBalance>> = BTreeMap::new();
        for balance in balances {
            by_currency
                .entry(balance.currency.clone())
                .or_default()
                .push(balance.clone());
        }
        by_currency
            .into_iter()
            .map(|(currency, group)| Ok((currency, self.plan(&group)?)))
            .collect()
    }
}

/// Net positions left after applying `transfers` to `balances`.
///
/// Every transfer must be in the balances' currency.
pub fn residual_nets(
    balances: &[ParticipantBalance],
    transfers: &[Transfer],
) -> Result<BTreeMap<ParticipantId, Money>> {
    let Some(currency) = single_currency(balances)? else {
        return Ok(BTreeMap::new());
    };
    let mut nets: BTreeMap<ParticipantId, Money> = BTreeMap::new();
    for balance in balances {
        let entry = nets
            .entry(balance.participant_id.clone())
            .or_insert_with(|| Money::zero(currency.clone()));
        *entry = entry.checked_add(&balance.net)?;
    }
    for transfer in transfers {
        let payer = nets
            .entry(transfer.from.clone())
            .or_insert_with(|| Money::zero(currency.clone()));
        *payer = payer.checked_add(&transfer.amount)?;
        let payee = nets
            .entry(transfer.to.clone())
            .or_insert_with(|| Money::zero(currency.clone()));
        *payee = payee.checked_sub(&transfer.amount)?;
    }
    Ok(nets)
}

fn single_currency(balances: &[ParticipantBalance]) -> Result<Option<CurrencyCode>> {
    let Some(first) = balances.first() else {
        return Ok(None);
    };
    let expected = &first.currency;
    for balance in balances {
        for found in [&balance.currency, balance.net.currency()] {
            if found != expected {
                return Err(LedgerError::MixedCurrency {
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
    }
    Ok(Some(expected.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(currency: &str, entries: &[(&str, i64)]) -> Vec<ParticipantBalance> {
        entries
            .iter()
            .map(|(who, net)| ParticipantBalance::from_net(*who, Money::new(*net, currency)))
            .collect()
    }

    fn summary(transfers: &[Transfer]) -> Vec<(String, String, i64)> {
        transfers
            .iter()
            .map(|t| (t.from.0.clone(), t.to.0.clone(), t.amount.minor()))
            .collect()
    }

    #[test]
    fn pays_largest_creditor_first() {
        let balances = nets("USD", &[("c", -5_000), ("a", 4_000), ("b", 1_000)]);
        let transfers = SettlementPlanner::new().plan(&balances).unwrap();
        assert_eq!(
            summary(&transfers),
            vec![
                ("c".into(), "a".into(), 4_000),
                ("c".into(), "b".into(), 1_000),
            ]
        );
    }

    #[test]
    fn ties_break_on_participant_id() {
        let balances = nets("USD", &[("z", 100), ("y", 100), ("b", -100), ("a", -100)]);
        let transfers = SettlementPlanner::new().plan(&balances).unwrap();
        assert_eq!(
            summary(&transfers),
            vec![("a".into(), "y".into(), 100), ("b".into(), "z".into(), 100)]
        );
    }

    #[test]
    fn settled_participants_are_skipped() {
        let balances = nets("USD", &[("a", 0), ("b", 0)]);
        assert!(SettlementPlanner::new().plan(&balances).unwrap().is_empty());
        assert!(SettlementPlanner::new().plan(&[]).unwrap().is_empty());
    }

    #[test]
    fn residue_below_tolerance_is_discarded() {
        let balances = nets("USD", &[("a", 1_002), ("b", -1_000), ("c", -2)]);
        let transfers = SettlementPlanner::with_tolerance(5).plan(&balances).unwrap();
        assert_eq!(summary(&transfers), vec![("b".into(), "a".into(), 1_000)]);
    }

    #[test]
    fn single_minor_unit_nets_need_no_transfer() {
        let balances = nets("USD", &[("a", 1), ("b", -1)]);
        assert!(SettlementPlanner::new().plan(&balances).unwrap().is_empty());

        let balances = nets("USD", &[("a", 3), ("b", -2), ("c", -1)]);
        let transfers = SettlementPlanner::new().plan(&balances).unwrap();
        assert_eq!(summary(&transfers), vec![("b".into(), "a".into(), 2)]);
    }

    #[test]
    fn nets_that_overflow_when_merged_are_an_error() {
        let mut balances = nets("USD", &[("a", i64::MAX), ("a", 1)]);
        balances.extend(nets("USD", &[("b", -5)]));
        let err = SettlementPlanner::new().plan(&balances).expect_err("overflow");
        assert!(matches!(err, LedgerError::AmountOutOfRange { .. }));
    }

    #[test]
    fn mixed_currencies_are_refused() {
        let mut balances = nets("USD", &[("a", 100)]);
        balances.extend(nets("EUR", &[("b", -100)]));
        let err = SettlementPlanner::new().plan(&balances).expect_err("mixed");
        assert!(matches!(err, LedgerError::MixedCurrency { .. }));
    }

    #[test]
    fn plan_all_partitions_by_currency() {
        let mut balances = nets("USD", &[("a", 100), ("b", -100)]);
        balances.extend(nets("EUR", &[("a", -300), ("b", 300)]));
        let plans = SettlementPlanner::new().plan_all(&balances).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(
            summary(&plans[&CurrencyCode::new("EUR")]),
            vec![("a".into(), "b".into(), 300)]
        );
    }

    #[test]
    fn applying_transfers_zeroes_every_net() {
        let balances = nets("USD", &[("a", 700), ("b", -200), ("c", -300), ("d", -200)]);
        let transfers = SettlementPlanner::new().plan(&balances).unwrap();
        assert_eq!(transfers.len(), 3);
        let residuals = residual_nets(&balances, &transfers).unwrap();
        assert!(residuals.values().all(Money::is_zero));
    }
}
