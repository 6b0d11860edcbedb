use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    balance::ParticipantBalance,
    expense::{Expense, ExpenseId, ParticipantId, TripId},
    payload::ExpensePayload,
};
use crate::{
    currency::CurrencyCode,
    errors::{LedgerError, Result},
    settlement::{SettlementPlanner, Transfer},
    validation::{self, ValidationContext},
};

/// How an expense without explicit splits is charged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnsplitPolicy {
    /// The payer owes the full amount; nobody else is charged.
    #[default]
    PayerOnly,
    /// The amount is shared evenly across the roster (payer-only without one).
    EvenAcrossRoster,
}

/// The live expense collection for exactly one trip.
///
/// Deserializing replays every stored expense through [`Ledger::add`], so a
/// snapshot holding an invalid record is refused as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LedgerSnapshot")]
pub struct Ledger {
    trip_id: TripId,
    roster: BTreeSet<ParticipantId>,
    policy: UnsplitPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_currency: Option<CurrencyCode>,
    expenses: Vec<Expense>,
}

#[derive(Deserialize)]
struct LedgerSnapshot {
    trip_id: TripId,
    #[serde(default)]
    roster: BTreeSet<ParticipantId>,
    #[serde(default)]
    policy: UnsplitPolicy,
    #[serde(default)]
    default_currency: Option<CurrencyCode>,
    #[serde(default)]
    expenses: Vec<Expense>,
}

impl TryFrom<LedgerSnapshot> for Ledger {
    type Error = LedgerError;

    fn try_from(snapshot: LedgerSnapshot) -> Result<Self> {
        let mut ledger = Ledger::new(snapshot.trip_id)
            .with_roster(snapshot.roster)
            .with_policy(snapshot.policy);
        ledger.default_currency = snapshot.default_currency;
        for expense in snapshot.expenses {
            ledger.add(expense)?;
        }
        Ok(ledger)
    }
}

#[derive(Default)]
struct Tally {
    paid: i64,
    owed: i64,
}

impl Ledger {
    pub fn new(trip_id: impl Into<TripId>) -> Self {
        Self {
            trip_id: trip_id.into(),
            roster: BTreeSet::new(),
            policy: UnsplitPolicy::default(),
            default_currency: None,
            expenses: Vec::new(),
        }
    }

    /// Restricts payers and split participants to `roster`.
    pub fn with_roster<I, P>(mut self, roster: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ParticipantId>,
    {
        self.roster = roster.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_policy(mut self, policy: UnsplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Currency assumed for payloads that leave `currency` out.
    pub fn with_default_currency(mut self, currency: impl Into<CurrencyCode>) -> Self {
        self.default_currency = Some(currency.into());
        self
    }

    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    pub fn roster(&self) -> &BTreeSet<ParticipantId> {
        &self.roster
    }

    pub fn policy(&self) -> UnsplitPolicy {
        self.policy
    }

    pub fn default_currency(&self) -> Option<&CurrencyCode> {
        self.default_currency.as_ref()
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    pub fn get(&self, id: ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id == id)
    }

    /// Rules every stored expense must satisfy: same trip, roster if one is set.
    pub fn validation_context(&self) -> ValidationContext {
        let mut context = ValidationContext::new().for_trip(self.trip_id.clone());
        if let Some(currency) = &self.default_currency {
            context = context.with_default_currency(currency.clone());
        }
        if self.roster.is_empty() {
            context
        } else {
            context.with_roster(self.roster.iter().cloned())
        }
    }

    /// Ids are stored without surrounding whitespace.
    pub fn add(&mut self, expense: Expense) -> Result<ExpenseId> {
        let expense = expense.with_trimmed_ids();
        self.check(&expense)?;
        if self.get(expense.id).is_some() {
            warn!(trip = %self.trip_id, expense = %expense.id, "duplicate expense id");
            return Err(LedgerError::DuplicateExpense(expense.id));
        }
        let id = expense.id;
        info!(
            trip = %self.trip_id,
            expense = %id,
            payer = %expense.payer_id,
            amount = %expense.amount,
            "expense added"
        );
        self.expenses.push(expense);
        Ok(id)
    }

    /// Validates a wire payload against this ledger and stores the result.
    pub fn add_payload(&mut self, payload: &ExpensePayload) -> Result<ExpenseId> {
        let expense = validation::validate_payload(payload, &self.validation_context())
            .map_err(|rejection| {
                warn!(trip = %self.trip_id, %rejection, "expense payload rejected");
                LedgerError::InvalidExpense(rejection)
            })?;
        self.add(expense)
    }

    /// Removes the record entirely. No undo record is kept; snapshot first if
    /// history matters.
    pub fn remove(&mut self, id: ExpenseId) -> Result<Expense> {
        let position = self.position(id)?;
        let removed = self.expenses.remove(position);
        info!(trip = %self.trip_id, expense = %id, "expense removed");
        Ok(removed)
    }

    /// Replaces the whole record stored under `id`; the stored id is kept.
    pub fn update(&mut self, id: ExpenseId, mut new_value: Expense) -> Result<()> {
        let position = self.position(id)?;
        new_value.id = id;
        let new_value = new_value.with_trimmed_ids();
        self.check(&new_value)?;
        self.expenses[position] = new_value;
        info!(trip = %self.trip_id, expense = %id, "expense updated");
        Ok(())
    }

    /// Everyone who paid or appears in a split.
    pub fn participants(&self) -> BTreeSet<ParticipantId> {
        self.expenses
            .iter()
            .flat_map(Expense::participants)
            .collect()
    }

    pub fn currencies(&self) -> BTreeSet<CurrencyCode> {
        self.expenses
            .iter()
            .map(|expense| expense.amount.currency().clone())
            .collect()
    }

    /// Net positions ordered by currency, then participant id.
    ///
    /// The result depends only on the set of stored expenses, not on the
    /// order they were added. Totals that leave the `i64` range fail with
    /// [`LedgerError::AmountOutOfRange`].
    pub fn balances(&self) -> Result<Vec<ParticipantBalance>> {
        let mut tallies: BTreeMap<(CurrencyCode, ParticipantId), Tally> = BTreeMap::new();
        for expense in &self.expenses {
            let currency = expense.amount.currency();
            let overflow = || LedgerError::AmountOutOfRange {
                currency: currency.clone(),
            };
            let payer = tallies
                .entry((currency.clone(), expense.payer_id.clone()))
                .or_default();
            payer.paid = payer
                .paid
                .checked_add(expense.amount.minor())
                .ok_or_else(overflow)?;
            for (participant, share) in self.shares(expense) {
                let sharer = tallies.entry((currency.clone(), participant)).or_default();
                sharer.owed = sharer.owed.checked_add(share).ok_or_else(overflow)?;
            }
        }
        let balances = tallies
            .into_iter()
            .map(|((currency, participant), tally)| {
                ParticipantBalance::new(participant, currency, tally.paid, tally.owed)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            trip = %self.trip_id,
            expenses = self.expenses.len(),
            balances = balances.len(),
            "balances computed"
        );
        Ok(balances)
    }

    pub fn balances_in(&self, currency: &CurrencyCode) -> Result<Vec<ParticipantBalance>> {
        Ok(self
            .balances()?
            .into_iter()
            .filter(|balance| &balance.currency == currency)
            .collect())
    }

    /// Plans transfers for each currency separately.
    pub fn settle(
        &self,
        planner: &SettlementPlanner,
    ) -> Result<BTreeMap<CurrencyCode, Vec<Transfer>>> {
        planner.plan_all(&self.balances()?)
    }

    fn shares(&self, expense: &Expense) -> Vec<(ParticipantId, i64)> {
        if expense.has_splits() {
            return expense
                .splits
                .iter()
                .map(|split| (split.participant_id.clone(), split.amount_owed.minor()))
                .collect();
        }
        match self.policy {
            UnsplitPolicy::EvenAcrossRoster if !self.roster.is_empty() => self
                .roster
                .iter()
                .cloned()
                .zip(expense.amount.split_evenly(self.roster.len()))
                .map(|(participant, share)| (participant, share.minor()))
                .collect(),
            _ => vec![(expense.payer_id.clone(), expense.amount.minor())],
        }
    }

    fn check(&self, expense: &Expense) -> Result<()> {
        validation::validate_expense(expense, &self.validation_context()).map_err(|rejection| {
            warn!(trip = %self.trip_id, expense = %expense.id, %rejection, "expense rejected");
            LedgerError::InvalidExpense(rejection)
        })
    }

    fn position(&self, id: ExpenseId) -> Result<usize> {
        self.expenses
            .iter()
            .position(|expense| expense.id == id)
            .ok_or(LedgerError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Money;
    use crate::ledger::{ExpenseCategory, Split};

    fn usd(major: i64) -> Money {
        Money::from_major(major, "USD")
    }

    fn dinner(payer: &str, amount: i64, guests: &[&str]) -> Expense {
        Expense::new("trip", payer, usd(amount), "Dinner", ExpenseCategory::Food)
            .with_splits(Split::even(&usd(amount), guests.iter().copied()))
    }

    #[test]
    fn unsplit_expense_charges_only_the_payer() {
        let mut ledger = Ledger::new("trip").with_roster(["a", "b", "c"]);
        ledger
            .add(Expense::new("trip", "a", usd(300), "Car", ExpenseCategory::Transport))
            .unwrap();
        let balances = ledger.balances().unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].paid, usd(300));
        assert_eq!(balances[0].owed, usd(300));
        assert!(balances[0].net.is_zero());
    }

    #[test]
    fn even_roster_policy_spreads_unsplit_expenses() {
        let mut ledger = Ledger::new("trip")
            .with_roster(["a", "b", "c"])
            .with_policy(UnsplitPolicy::EvenAcrossRoster);
        ledger
            .add(Expense::new("trip", "a", Money::new(1_000, "USD"), "Snacks", ExpenseCategory::Food))
            .unwrap();
        let nets: Vec<i64> = ledger.balances().unwrap().iter().map(|b| b.net.minor()).collect();
        assert_eq!(nets, vec![666, -333, -333]);
    }

    #[test]
    fn balances_ignore_insertion_order() {
        let first = dinner("a", 90, &["a", "b", "c"]);
        let second = dinner("b", 60, &["a", "b", "c"]);

        let mut forward = Ledger::new("trip");
        forward.add(first.clone()).unwrap();
        forward.add(second.clone()).unwrap();
        let mut backward = Ledger::new("trip");
        backward.add(second).unwrap();
        backward.add(first).unwrap();

        assert_eq!(forward.balances().unwrap(), backward.balances().unwrap());
        let total: i64 = forward.balances().unwrap().iter().map(|b| b.net.minor()).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn rejected_expense_leaves_ledger_untouched() {
        let mut ledger = Ledger::new("trip");
        let err = ledger
            .add(Expense::new("trip", "a", Money::new(-500, "USD"), "Oops", ExpenseCategory::Other))
            .expect_err("negative amount");
        assert!(matches!(err, LedgerError::InvalidExpense(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let mut ledger = Ledger::new("trip");
        let expense = dinner("a", 30, &["a", "b"]);
        ledger.add(expense.clone()).unwrap();
        let err = ledger.add(expense).expect_err("same id twice");
        assert!(matches!(err, LedgerError::DuplicateExpense(_)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn update_replaces_record_and_keeps_id() {
        let mut ledger = Ledger::new("trip");
        let id = ledger.add(dinner("a", 30, &["a", "b"])).unwrap();
        ledger.update(id, dinner("b", 40, &["a", "b"])).unwrap();
        let stored = ledger.get(id).expect("still present");
        assert_eq!(stored.payer_id, ParticipantId::new("b"));
        assert_eq!(stored.amount, usd(40));

        let bad = Expense::new("trip", "b", usd(40), " ", ExpenseCategory::Food);
        assert!(matches!(
            ledger.update(id, bad),
            Err(LedgerError::InvalidExpense(_))
        ));
        assert_eq!(ledger.get(id).map(|e| e.amount.clone()), Some(usd(40)));
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let mut ledger = Ledger::new("trip");
        ledger.add(dinner("a", 30, &["a", "b"])).unwrap();
        let before = ledger.balances().unwrap();
        let missing = ExpenseId::new();
        assert!(matches!(
            ledger.remove(missing),
            Err(LedgerError::NotFound(id)) if id == missing
        ));
        assert_eq!(before, ledger.balances().unwrap());
    }

    #[test]
    fn padded_ids_are_stored_trimmed() {
        let mut ledger = Ledger::new("trip").with_roster(["a", "b"]);
        let amount = usd(20);
        let expense = Expense::new(" trip ", " a ", amount.clone(), "Taxi", ExpenseCategory::Transport)
            .with_splits(vec![
                Split::new("a ", Money::from_major(10, "USD")),
                Split::new(" b", Money::from_major(10, "USD")),
            ]);
        let id = ledger.add(expense).unwrap();
        let stored = ledger.get(id).expect("stored");
        assert_eq!(stored.trip_id, TripId::new("trip"));
        assert_eq!(stored.payer_id, ParticipantId::new("a"));
        let people: Vec<String> = ledger
            .balances()
            .unwrap()
            .into_iter()
            .map(|balance| balance.participant_id.0)
            .collect();
        assert_eq!(people, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn totals_past_the_i64_range_fail_instead_of_wrapping() {
        let mut ledger = Ledger::new("trip");
        let huge = Money::parse("90000000000000000", "USD").unwrap();
        for _ in 0..2 {
            ledger
                .add(Expense::new("trip", "a", huge.clone(), "Yacht", ExpenseCategory::Other))
                .unwrap();
        }
        assert!(matches!(
            ledger.balances(),
            Err(LedgerError::AmountOutOfRange { .. })
        ));
        assert!(ledger.settle(&SettlementPlanner::new()).is_err());
    }

    #[test]
    fn snapshot_round_trip_revalidates_expenses() {
        let mut ledger = Ledger::new("trip").with_roster(["a", "b"]);
        ledger.add(dinner("a", 30, &["a", "b"])).unwrap();
        let json = serde_json::to_string(&ledger).unwrap();
        let restored: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.expenses(), ledger.expenses());
        assert_eq!(restored.roster(), ledger.roster());

        let mut tampered: serde_json::Value = serde_json::from_str(&json).unwrap();
        tampered["expenses"][0]["amount"]["amount_minor"] = serde_json::json!(-3000);
        let err = serde_json::from_value::<Ledger>(tampered).expect_err("negative amount");
        assert!(err.to_string().contains("amount must be positive"), "{err}");
    }

    #[test]
    fn configured_currency_fills_in_missing_payload_currency() {
        let mut ledger = Ledger::new("trip").with_default_currency("eur");
        let payload = ExpensePayload::from_json(
            r#"{"trip_id": "trip", "payer_id": "a", "amount": "12.40",
                "description": "Gelato", "category": "food"}"#,
        )
        .unwrap();
        let id = ledger.add_payload(&payload).unwrap();
        assert_eq!(ledger.get(id).map(|e| e.amount.clone()), Some(Money::new(1_240, "EUR")));

        let mut strict = Ledger::new("trip");
        assert!(matches!(
            strict.add_payload(&payload),
            Err(LedgerError::InvalidExpense(rejection))
                if rejection.contains(&crate::validation::Violation::MissingCurrency)
        ));
    }

    #[test]
    fn expenses_from_other_trips_are_rejected() {
        let mut ledger = Ledger::new("trip");
        let stray = Expense::new("elsewhere", "a", usd(10), "Stamp", ExpenseCategory::Communication);
        assert!(matches!(ledger.add(stray), Err(LedgerError::InvalidExpense(_))));
    }
}
