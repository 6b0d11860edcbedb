use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CurrencyCode, Money};

/// One conversion rate supplied by the caller: `1 from = rate to`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FxRate {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Read-only rate table injected by the caller. Rates are never fetched here.
#[derive(Debug, Clone, Default)]
pub struct FxTable {
    rates: BTreeMap<(CurrencyCode, CurrencyCode), FxRate>,
}

impl FxTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rate(&mut self, rate: FxRate) {
        let key = (rate.from.clone(), rate.to.clone());
        self.rates.insert(key, rate);
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.add_rate(FxRate {
            from: CurrencyCode::new(from),
            to: CurrencyCode::new(to),
            rate,
            source: None,
        });
        self
    }

    pub fn all_rates(&self) -> Vec<FxRate> {
        self.rates.values().cloned().collect()
    }

    /// Direct rate first, then the inverse of the opposite pair.
    pub fn lookup_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Some(rate.rate);
        }
        self.rates
            .get(&(to.clone(), from.clone()))
            .filter(|rate| rate.rate.abs() > f64::EPSILON)
            .map(|rate| 1.0 / rate.rate)
    }

    /// Converts and rounds half away from zero to the nearest minor unit.
    pub fn convert(&self, amount: &Money, to: &CurrencyCode) -> Option<Money> {
        let rate = self.lookup_rate(amount.currency(), to)?;
        let converted = (amount.minor() as f64 * rate).round();
        if !converted.is_finite() || converted.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Money::new(converted as i64, to.clone()))
    }
}

impl From<Vec<FxRate>> for FxTable {
    fn from(rates: Vec<FxRate>) -> Self {
        let mut table = Self::new();
        for rate in rates {
            table.add_rate(rate);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_with_direct_and_inverse_rates() {
        let table = FxTable::new().with_rate("EUR", "USD", 1.25);
        let eur = Money::new(1000, "EUR");
        assert_eq!(
            table.convert(&eur, &CurrencyCode::new("USD")),
            Some(Money::new(1250, "USD"))
        );
        let usd = Money::new(1250, "USD");
        assert_eq!(
            table.convert(&usd, &CurrencyCode::new("EUR")),
            Some(Money::new(1000, "EUR"))
        );
    }

    #[test]
    fn unknown_pair_is_not_guessed() {
        let table = FxTable::new().with_rate("EUR", "USD", 1.25);
        assert!(table
            .convert(&Money::new(100, "JPY"), &CurrencyCode::new("USD"))
            .is_none());
        assert_eq!(
            table.convert(&Money::new(100, "JPY"), &CurrencyCode::new("JPY")),
            Some(Money::new(100, "JPY"))
        );
    }
}
