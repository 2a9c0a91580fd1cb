use serde::{Deserialize, Serialize};

/// Canonical form of a currency code: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// One exchange rate relative to a snapshot's base currency.
///
/// Identity is the currency code; records are only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub currency_code: String,
    pub rate: f64,
}

impl RateRecord {
    pub fn new(currency_code: impl AsRef<str>, rate: f64) -> Self {
        Self {
            currency_code: normalize_code(currency_code.as_ref()),
            rate,
        }
    }

    /// Convert an amount of the base currency into this currency.
    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.rate
    }
}
