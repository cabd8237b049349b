use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Static conversion rates into a single base currency.
///
/// Codes missing from the table convert 1:1, so an unrecognised currency is
/// treated as already being in base units rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyTable {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        Self::hkd_base()
    }
}

impl CurrencyTable {
    pub fn new(base: &str) -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(normalize(base), 1.0);
        Self {
            base: normalize(base),
            rates,
        }
    }

    pub fn hkd_base() -> Self {
        Self::new("HKD")
            .with_rate("USD", 7.8)
            .with_rate("CNY", 1.08)
            .with_rate("EUR", 8.5)
            .with_rate("GBP", 9.9)
            .with_rate("JPY", 0.052)
            .with_rate("AUD", 5.1)
            .with_rate("CAD", 5.7)
            .with_rate("SGD", 5.8)
    }

    pub fn with_rate(mut self, currency: &str, rate: f64) -> Self {
        self.rates.insert(normalize(currency), rate);
        self
    }

    pub fn rate(&self, currency: &str) -> f64 {
        self.rates.get(&normalize(currency)).copied().unwrap_or(1.0)
    }

    pub fn to_base(&self, amount: f64, currency: &str) -> f64 {
        amount * self.rate(currency)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
