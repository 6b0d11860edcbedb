//! Rejects malformed expenses before they reach a [`Ledger`](crate::ledger::Ledger).
//!
//! Every rule is checked and every violation is reported, so a caller can
//! show a complete correction list in one round trip.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::currency::{parse_minor_units, CurrencyCode, Money};
use crate::ledger::{
    AmountInput, Expense, ExpenseCategory, ExpensePayload, ParticipantId, Split, SplitPayload,
    TripId,
};

/// A single broken rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    MissingTripId,
    TripMismatch { expected: TripId, found: TripId },
    MissingPayerId,
    MissingAmount,
    UnreadableAmount { input: String },
    NonPositiveAmount,
    MissingCurrency,
    MalformedCurrency { input: String },
    EmptyDescription,
    MissingCategory,
    UnknownCategory { input: String },
    MissingSplitParticipant { index: usize },
    UnreadableSplitAmount { index: usize, input: String },
    NegativeSplit { participant: ParticipantId },
    DuplicateSplitParticipant { participant: ParticipantId },
    SplitCurrencyMismatch {
        participant: ParticipantId,
        expected: CurrencyCode,
        found: CurrencyCode,
    },
    SplitSumMismatch { expected: Money, actual: Money },
    SplitSumOutOfRange { currency: CurrencyCode },
    UnknownParticipant { participant: ParticipantId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingTripId => f.write_str("trip id is required"),
            Violation::TripMismatch { expected, found } => {
                write!(f, "expense belongs to trip `{found}`, not `{expected}`")
            }
            Violation::MissingPayerId => f.write_str("payer id is required"),
            Violation::MissingAmount => f.write_str("amount is required"),
            Violation::UnreadableAmount { input } => {
                write!(f, "amount `{input}` is not a decimal with at most two places")
            }
            Violation::NonPositiveAmount => f.write_str("amount must be positive"),
            Violation::MissingCurrency => f.write_str("currency is required"),
            Violation::MalformedCurrency { input } => {
                write!(f, "currency `{input}` is not a three-letter code")
            }
            Violation::EmptyDescription => f.write_str("description must not be empty"),
            Violation::MissingCategory => f.write_str("category is required"),
            Violation::UnknownCategory { input } => write!(f, "unknown category `{input}`"),
            Violation::MissingSplitParticipant { index } => {
                write!(f, "split #{} has no participant", index + 1)
            }
            Violation::UnreadableSplitAmount { index, input } => {
                write!(f, "split #{} amount `{input}` is not a valid decimal", index + 1)
            }
            Violation::NegativeSplit { participant } => {
                write!(f, "split amounts for `{participant}` must not be negative")
            }
            Violation::DuplicateSplitParticipant { participant } => {
                write!(f, "`{participant}` appears in more than one split")
            }
            Violation::SplitCurrencyMismatch {
                participant,
                expected,
                found,
            } => write!(
                f,
                "split for `{participant}` is in {found} but the expense is in {expected}"
            ),
            Violation::SplitSumMismatch { expected, actual } => {
                write!(f, "splits add up to {actual} but the expense is {expected}")
            }
            Violation::SplitSumOutOfRange { currency } => {
                write!(f, "split amounts in {currency} are too large to add up")
            }
            Violation::UnknownParticipant { participant } => {
                write!(f, "`{participant}` is not on the trip roster")
            }
        }
    }
}

/// The full list of violations for one candidate expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub violations: Vec<Violation>,
}

impl Rejection {
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

/// What a candidate is checked against beyond its own shape.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    pub trip_id: Option<TripId>,
    pub roster: Option<BTreeSet<ParticipantId>>,
    /// Used when a payload omits its currency.
    pub default_currency: Option<CurrencyCode>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_trip(mut self, trip_id: TripId) -> Self {
        self.trip_id = Some(trip_id);
        self
    }

    pub fn with_roster<I, P>(mut self, roster: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ParticipantId>,
    {
        self.roster = Some(roster.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = Some(currency);
        self
    }
}

/// Checks a typed expense.
pub fn validate_expense(
    expense: &Expense,
    context: &ValidationContext,
) -> Result<(), Rejection> {
    let mut checks = Checks::new(context);
    checks.trip(expense.trip_id.as_str());
    checks.payer(expense.payer_id.as_str());
    checks.amount(expense.amount.minor());
    checks.description(&expense.description);
    checks.splits(&expense.amount, &expense.splits);
    checks.finish()
}

/// Checks a wire payload and, if it passes, builds the typed expense.
pub fn validate_payload(
    payload: &ExpensePayload,
    context: &ValidationContext,
) -> Result<Expense, Rejection> {
    let mut checks = Checks::new(context);

    let trip_id = payload.trip_id.as_deref().unwrap_or_default();
    checks.trip(trip_id);
    let payer_id = payload.payer_id.as_deref().unwrap_or_default();
    checks.payer(payer_id);

    let currency = checks.currency(payload.currency.as_deref());
    let amount_minor = checks.amount_input(payload.amount.as_ref());
    if let Some(minor) = amount_minor {
        checks.amount(minor);
    }

    let description = payload.description.as_deref().unwrap_or_default();
    checks.description(description);
    let category = checks.category(payload.category.as_deref());

    let mut splits = Vec::new();
    let mut splits_complete = true;
    for (index, raw) in payload.splits.iter().flatten().enumerate() {
        match checks.split_input(index, raw, currency.as_ref()) {
            Some(split) => splits.push(split),
            None => splits_complete = false,
        }
    }

    let amount = match (currency, amount_minor) {
        (Some(currency), Some(minor)) => Some(Money::new(minor, currency)),
        _ => None,
    };
    match &amount {
        Some(amount) if splits_complete => checks.splits(amount, &splits),
        _ => checks.split_participants(&splits),
    }

    match (checks.finish(), amount, category) {
        (Ok(()), Some(amount), Some(category)) => Ok(Expense::new(
            trip_id.trim(),
            payer_id.trim(),
            amount,
            description.trim(),
            category,
        )
        .with_splits(splits)),
        (Err(rejection), _, _) => Err(rejection),
        // Unreachable in practice: a missing amount or category is always recorded.
        (Ok(()), _, _) => Err(Rejection {
            violations: vec![Violation::MissingAmount],
        }),
    }
}

struct Checks<'a> {
    context: &'a ValidationContext,
    violations: Vec<Violation>,
    unknown: BTreeSet<ParticipantId>,
}

impl<'a> Checks<'a> {
    fn new(context: &'a ValidationContext) -> Self {
        Self {
            context,
            violations: Vec::new(),
            unknown: BTreeSet::new(),
        }
    }

    fn finish(mut self) -> Result<(), Rejection> {
        self.violations.extend(
            self.unknown
                .into_iter()
                .map(|participant| Violation::UnknownParticipant { participant }),
        );
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(Rejection {
                violations: self.violations,
            })
        }
    }

    fn trip(&mut self, trip_id: &str) {
        let trip_id = trip_id.trim();
        if trip_id.is_empty() {
            self.violations.push(Violation::MissingTripId);
            return;
        }
        if let Some(expected) = &self.context.trip_id {
            if expected.as_str() != trip_id {
                self.violations.push(Violation::TripMismatch {
                    expected: expected.clone(),
                    found: TripId::new(trip_id),
                });
            }
        }
    }

    fn payer(&mut self, payer_id: &str) {
        let payer_id = payer_id.trim();
        if payer_id.is_empty() {
            self.violations.push(Violation::MissingPayerId);
        } else {
            self.on_roster(&ParticipantId::new(payer_id));
        }
    }

    fn on_roster(&mut self, participant: &ParticipantId) {
        if let Some(roster) = &self.context.roster {
            if !roster.contains(participant) {
                self.unknown.insert(participant.clone());
            }
        }
    }

    fn amount(&mut self, minor: i64) {
        if minor <= 0 {
            self.violations.push(Violation::NonPositiveAmount);
        }
    }

    fn amount_input(&mut self, input: Option<&AmountInput>) -> Option<i64> {
        let Some(input) = input else {
            self.violations.push(Violation::MissingAmount);
            return None;
        };
        let text = input.as_text();
        match parse_minor_units(&text) {
            Ok(minor) => Some(minor),
            Err(_) => {
                self.violations
                    .push(Violation::UnreadableAmount { input: text });
                None
            }
        }
    }

    fn currency(&mut self, input: Option<&str>) -> Option<CurrencyCode> {
        let raw = input.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            if let Some(fallback) = &self.context.default_currency {
                return Some(fallback.clone());
            }
            self.violations.push(Violation::MissingCurrency);
            return None;
        }
        let code = CurrencyCode::new(raw);
        if code.is_well_formed() {
            Some(code)
        } else {
            self.violations.push(Violation::MalformedCurrency {
                input: raw.to_string(),
            });
            None
        }
    }

    fn description(&mut self, description: &str) {
        if description.trim().is_empty() {
            self.violations.push(Violation::EmptyDescription);
        }
    }

    fn category(&mut self, input: Option<&str>) -> Option<ExpenseCategory> {
        let Some(raw) = input.filter(|raw| !raw.trim().is_empty()) else {
            self.violations.push(Violation::MissingCategory);
            return None;
        };
        match raw.parse::<ExpenseCategory>() {
            Ok(category) => Some(category),
            Err(_) => {
                self.violations.push(Violation::UnknownCategory {
                    input: raw.to_string(),
                });
                None
            }
        }
    }

    fn split_input(
        &mut self,
        index: usize,
        raw: &SplitPayload,
        currency: Option<&CurrencyCode>,
    ) -> Option<Split> {
        let participant = raw
            .participant_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match participant {
            Some(id) => self.on_roster(&ParticipantId::new(id)),
            None => self
                .violations
                .push(Violation::MissingSplitParticipant { index }),
        }
        let owed = self.split_amount(index, raw.amount_owed.as_ref(), true);
        let paid = self.split_amount(index, raw.amount_paid.as_ref(), false);
        let (participant, owed, paid, currency) = (participant?, owed?, paid?, currency?);
        Some(
            Split::new(participant, Money::new(owed, currency.clone()))
                .with_paid(Money::new(paid, currency.clone())),
        )
    }

    fn split_amount(
        &mut self,
        index: usize,
        input: Option<&AmountInput>,
        required: bool,
    ) -> Option<i64> {
        let Some(input) = input else {
            if required {
                self.violations.push(Violation::UnreadableSplitAmount {
                    index,
                    input: String::new(),
                });
                return None;
            }
            return Some(0);
        };
        let text = input.as_text();
        match parse_minor_units(&text) {
            Ok(minor) => Some(minor),
            Err(_) => {
                self.violations
                    .push(Violation::UnreadableSplitAmount { index, input: text });
                None
            }
        }
    }

    /// Per-split rules that do not need a trustworthy total.
    fn split_participants(&mut self, splits: &[Split]) {
        let mut seen = BTreeSet::new();
        for (index, split) in splits.iter().enumerate() {
            let participant = &split.participant_id;
            if participant.as_str().trim().is_empty() {
                self.violations
                    .push(Violation::MissingSplitParticipant { index });
            } else {
                self.on_roster(participant);
            }
            if !seen.insert(participant.clone()) {
                self.violations.push(Violation::DuplicateSplitParticipant {
                    participant: participant.clone(),
                });
            }
            if split.amount_owed.is_negative() || split.amount_paid.is_negative() {
                self.violations.push(Violation::NegativeSplit {
                    participant: participant.clone(),
                });
            }
        }
    }

    fn splits(&mut self, amount: &Money, splits: &[Split]) {
        if splits.is_empty() {
            return;
        }
        self.split_participants(splits);

        let mut currencies_match = true;
        for split in splits {
            for side in [&split.amount_owed, &split.amount_paid] {
                if !side.same_currency(amount) {
                    currencies_match = false;
                    self.violations.push(Violation::SplitCurrencyMismatch {
                        participant: split.participant_id.clone(),
                        expected: amount.currency().clone(),
                        found: side.currency().clone(),
                    });
                    break;
                }
            }
        }
        if !currencies_match {
            return;
        }

        let owed = Money::checked_sum(
            amount.currency(),
            splits.iter().map(|split| &split.amount_owed),
        );
        match owed {
            Ok(owed) if owed != *amount => {
                self.violations.push(Violation::SplitSumMismatch {
                    expected: amount.clone(),
                    actual: owed,
                });
            }
            Ok(_) => {}
            Err(_) => self.violations.push(Violation::SplitSumOutOfRange {
                currency: amount.currency().clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(amount_minor: i64) -> Expense {
        Expense::new(
            "trip-1",
            "alice",
            Money::new(amount_minor, "USD"),
            "Museum tickets",
            ExpenseCategory::Activities,
        )
    }

    #[test]
    fn negative_amount_is_the_only_violation() {
        let rejection = validate_expense(&expense(-500), &ValidationContext::new())
            .expect_err("negative amount");
        assert_eq!(rejection.messages(), vec!["amount must be positive"]);
    }

    #[test]
    fn reports_every_violation_at_once() {
        let mut candidate = expense(0);
        candidate.trip_id = TripId::new(" ");
        candidate.payer_id = ParticipantId::new("");
        candidate.description = "   ".into();
        let rejection =
            validate_expense(&candidate, &ValidationContext::new()).expect_err("rejected");
        assert_eq!(
            rejection.violations,
            vec![
                Violation::MissingTripId,
                Violation::MissingPayerId,
                Violation::NonPositiveAmount,
                Violation::EmptyDescription,
            ]
        );
    }

    #[test]
    fn split_sum_must_match_exactly() {
        let candidate = expense(30_000).with_splits(vec![
            Split::new("alice", Money::new(10_000, "USD")),
            Split::new("bob", Money::new(9_999, "USD")),
        ]);
        let rejection =
            validate_expense(&candidate, &ValidationContext::new()).expect_err("off by one cent");
        assert_eq!(
            rejection.violations,
            vec![Violation::SplitSumMismatch {
                expected: Money::new(30_000, "USD"),
                actual: Money::new(19_999, "USD"),
            }]
        );
    }

    #[test]
    fn split_currency_mismatch_skips_the_sum_rule() {
        let candidate = expense(10_000).with_splits(vec![
            Split::new("alice", Money::new(5_000, "USD")),
            Split::new("bob", Money::new(5_000, "EUR")),
        ]);
        let rejection = validate_expense(&candidate, &ValidationContext::new()).expect_err("eur");
        assert_eq!(rejection.violations.len(), 1);
        assert!(matches!(
            rejection.violations[0],
            Violation::SplitCurrencyMismatch { .. }
        ));
    }

    #[test]
    fn roster_and_trip_are_enforced_when_supplied() {
        let context = ValidationContext::new()
            .for_trip(TripId::new("trip-2"))
            .with_roster(["alice", "bob"]);
        let candidate = expense(9_000).with_splits(Split::even(
            &Money::new(9_000, "USD"),
            ["alice", "bob", "mallory"],
        ));
        let rejection = validate_expense(&candidate, &context).expect_err("unknown participant");
        assert_eq!(
            rejection.violations,
            vec![
                Violation::TripMismatch {
                    expected: TripId::new("trip-2"),
                    found: TripId::new("trip-1"),
                },
                Violation::UnknownParticipant {
                    participant: ParticipantId::new("mallory"),
                },
            ]
        );
    }

    #[test]
    fn split_sum_that_would_wrap_is_rejected() {
        let shares = [6_148_914_691_236_517_239, 6_148_914_691_236_517_239, 6_148_914_691_236_517_238];
        let candidate = expense(100).with_splits(
            ["alice", "bob", "carol"]
                .into_iter()
                .zip(shares)
                .map(|(who, minor)| Split::new(who, Money::new(minor, "USD")))
                .collect(),
        );
        let rejection =
            validate_expense(&candidate, &ValidationContext::new()).expect_err("overflowing splits");
        assert_eq!(
            rejection.violations,
            vec![Violation::SplitSumOutOfRange {
                currency: CurrencyCode::new("USD")
            }]
        );
    }

    #[test]
    fn payload_becomes_typed_expense() {
        let payload = ExpensePayload {
            trip_id: Some("trip-1".into()),
            payer_id: Some("alice".into()),
            amount: Some(AmountInput::from("90")),
            currency: Some("usd".into()),
            description: Some(" Groceries ".into()),
            category: Some("Food".into()),
            splits: None,
        };
        let expense = validate_payload(&payload, &ValidationContext::new()).expect("valid");
        assert_eq!(expense.amount, Money::from_major(90, "USD"));
        assert_eq!(expense.description, "Groceries");
        assert_eq!(expense.category, ExpenseCategory::Food);
        assert!(expense.splits.is_empty());
    }

    #[test]
    fn empty_payload_lists_all_missing_fields() {
        let rejection = validate_payload(&ExpensePayload::default(), &ValidationContext::new())
            .expect_err("nothing supplied");
        assert_eq!(
            rejection.violations,
            vec![
                Violation::MissingTripId,
                Violation::MissingPayerId,
                Violation::MissingCurrency,
                Violation::MissingAmount,
                Violation::EmptyDescription,
                Violation::MissingCategory,
            ]
        );
    }
}
