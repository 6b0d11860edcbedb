//! Exact money arithmetic in minor units, plus the injected FX table used by
//! informational reports.

pub mod fx;

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{LedgerError, Result};

pub use fx::{FxRate, FxTable};

/// Amounts are stored scaled to two decimal places.
pub const MINOR_UNITS: u32 = 2;
const SCALE: i64 = 100;

/// ISO 4217-style currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Three ASCII letters, e.g. `USD`.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 3 && self.0.chars().all(|ch| ch.is_ascii_uppercase())
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Failures when reading a decimal amount from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMoneyError {
    #[error("amount is empty")]
    Empty,
    #[error("`{0}` is not a decimal amount")]
    Malformed(String),
    #[error("`{0}` has more than two decimal places")]
    TooPrecise(String),
    #[error("`{0}` is out of range")]
    OutOfRange(String),
}

/// A signed amount of one currency, held in minor units (cents).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Money {
    amount_minor: i64,
    currency: CurrencyCode,
}

impl Money {
    pub fn new(amount_minor: i64, currency: impl Into<CurrencyCode>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<CurrencyCode>) -> Self {
        Self::new(0, currency)
    }

    /// Builds an amount from whole currency units, e.g. `from_major(300, "USD")` is 300.00.
    pub fn from_major(amount: i64, currency: impl Into<CurrencyCode>) -> Self {
        Self::new(amount * SCALE, currency)
    }

    /// Parses `"12"`, `"12.5"`, `"-0.75"`. Extra precision is rejected, never rounded.
    pub fn parse(text: &str, currency: impl Into<CurrencyCode>) -> std::result::Result<Self, ParseMoneyError> {
        Ok(Self::new(parse_minor_units(text)?, currency))
    }

    pub fn minor(&self) -> i64 {
        self.amount_minor
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount_minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount_minor > 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount_minor < 0
    }

    pub fn abs(&self) -> Self {
        Self::new(self.amount_minor.saturating_abs(), self.currency.clone())
    }

    pub fn negated(&self) -> Self {
        Self::new(self.amount_minor.saturating_neg(), self.currency.clone())
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    /// Fails on a currency mismatch or when the sum leaves the `i64` range.
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let sum = self
            .amount_minor
            .checked_add(other.amount_minor)
            .ok_or_else(|| self.out_of_range())?;
        Ok(Self::new(sum, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let difference = self
            .amount_minor
            .checked_sub(other.amount_minor)
            .ok_or_else(|| self.out_of_range())?;
        Ok(Self::new(difference, self.currency.clone()))
    }

    /// Sums same-currency amounts; an empty input is zero in `currency`.
    pub fn checked_sum<'a, I>(currency: &CurrencyCode, amounts: I) -> Result<Money>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency.clone()), |total, amount| {
                total.checked_add(amount)
            })
    }

    /// Divides into `parts` shares that add back up to exactly `self`.
    ///
    /// The leftover minor units are handed out one each to the leading shares.
    pub fn split_evenly(&self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let count = parts as i64;
        let base = self.amount_minor / count;
        let remainder = self.amount_minor % count;
        let step = remainder.signum();
        (0..count)
            .map(|index| {
                let extra = if index < remainder.abs() { step } else { 0 };
                Self::new(base + extra, self.currency.clone())
            })
            .collect()
    }

    fn out_of_range(&self) -> LedgerError {
        LedgerError::AmountOutOfRange {
            currency: self.currency.clone(),
        }
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if self.same_currency(other) {
            Ok(())
        } else {
            Err(LedgerError::MixedCurrency {
                expected: self.currency.clone(),
                found: other.currency.clone(),
            })
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(
            f,
            "{}{}.{:02} {}",
            sign,
            abs / SCALE as u64,
            abs % SCALE as u64,
            self.currency
        )
    }
}

/// Reads a decimal string into minor units.
///
/// Trailing zeros beyond the second place are accepted (`"100.250"`); any
/// other extra precision is an error.
pub fn parse_minor_units(text: &str) -> std::result::Result<i64, ParseMoneyError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseMoneyError::Empty);
    }
    let malformed = || ParseMoneyError::Malformed(trimmed.to_string());
    // `Decimal` tolerates digit separators; amounts on the wire must not.
    if trimmed.contains('_') {
        return Err(malformed());
    }
    let value = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str(trimmed)
    }
    .map_err(|_| malformed())?
    .normalize();
    if value.scale() > MINOR_UNITS {
        return Err(ParseMoneyError::TooPrecise(trimmed.to_string()));
    }
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| ParseMoneyError::OutOfRange(trimmed.to_string()))
}
