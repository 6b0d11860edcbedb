//! Read-only projections of a trip's expenses for display.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    currency::{CurrencyCode, FxTable, Money},
    errors::Result,
    ledger::{Expense, ExpenseCategory, Ledger, ParticipantBalance, ParticipantId},
    settlement::{SettlementPlanner, Transfer},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryBreakdown {
    pub category: ExpenseCategory,
    pub count: usize,
    /// Amounts are never summed across currencies.
    pub totals: BTreeMap<CurrencyCode, Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrencyBreakdown {
    pub currency: CurrencyCode,
    pub count: usize,
    pub total: Money,
}

/// One participant's position and the payments that involve them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBalanceSummary {
    pub participant_id: ParticipantId,
    pub balances: Vec<ParticipantBalance>,
    pub pays: Vec<Transfer>,
    pub receives: Vec<Transfer>,
}

/// Trip spending with an optional grand total in a home currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripTotals {
    pub per_currency: Vec<CurrencyBreakdown>,
    pub base_currency: CurrencyCode,
    /// Sum of every currency the FX table could convert.
    pub converted_total: Money,
    /// Currencies left out of `converted_total` for lack of a rate.
    pub unconverted: Vec<CurrencyCode>,
}

/// Count and per-currency totals for each category that has expenses.
pub fn category_breakdown(expenses: &[Expense]) -> Result<Vec<CategoryBreakdown>> {
    let mut rows: BTreeMap<ExpenseCategory, (usize, BTreeMap<CurrencyCode, Money>)> =
        BTreeMap::new();
    for expense in expenses {
        let (count, totals) = rows.entry(expense.category).or_default();
        *count += 1;
        let currency = expense.amount.currency();
        let total = totals
            .entry(currency.clone())
            .or_insert_with(|| Money::zero(currency.clone()));
        *total = total.checked_add(&expense.amount)?;
    }
    Ok(rows
        .into_iter()
        .map(|(category, (count, totals))| CategoryBreakdown {
            category,
            count,
            totals,
        })
        .collect())
}

pub fn currency_breakdown(expenses: &[Expense]) -> Result<Vec<CurrencyBreakdown>> {
    let mut rows: BTreeMap<CurrencyCode, (usize, Vec<&Money>)> = BTreeMap::new();
    for expense in expenses {
        let (count, amounts) = rows.entry(expense.amount.currency().clone()).or_default();
        *count += 1;
        amounts.push(&expense.amount);
    }
    rows.into_iter()
        .map(|(currency, (count, amounts))| {
            Ok(CurrencyBreakdown {
                total: Money::checked_sum(&currency, amounts)?,
                currency,
                count,
            })
        })
        .collect()
}

pub fn user_balance_summary(
    ledger: &Ledger,
    participant: &ParticipantId,
    planner: &SettlementPlanner,
) -> Result<UserBalanceSummary> {
    let balances = ledger
        .balances()?
        .into_iter()
        .filter(|balance| &balance.participant_id == participant)
        .collect();
    let mut pays = Vec::new();
    let mut receives = Vec::new();
    for transfers in ledger.settle(planner)?.into_values() {
        for transfer in transfers {
            if &transfer.from == participant {
                pays.push(transfer);
            } else if &transfer.to == participant {
                receives.push(transfer);
            }
        }
    }
    Ok(UserBalanceSummary {
        participant_id: participant.clone(),
        balances,
        pays,
        receives,
    })
}

/// Currencies the FX table cannot convert are listed rather than guessed.
pub fn trip_totals(expenses: &[Expense], base: &CurrencyCode, fx: &FxTable) -> Result<TripTotals> {
    let per_currency = currency_breakdown(expenses)?;
    let mut converted_total = Money::zero(base.clone());
    let mut unconverted = Vec::new();
    for row in &per_currency {
        match fx.convert(&row.total, base) {
            Some(amount) => converted_total = converted_total.checked_add(&amount)?,
            None => unconverted.push(row.currency.clone()),
        }
    }
    Ok(TripTotals {
        per_currency,
        base_currency: base.clone(),
        converted_total,
        unconverted,
    })
}
