use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::rate::{normalize_code, RateRecord};

/// An immutable, timestamped, complete set of rates relative to one base currency.
///
/// Construction enforces at most one record per currency code. A later record
/// for the same code replaces the earlier one but keeps its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    timestamp: i64,
    base_currency: String,
    records: Vec<RateRecord>,
}

impl RateSnapshot {
    pub fn new(
        timestamp: i64,
        base_currency: impl AsRef<str>,
        records: impl IntoIterator<Item = RateRecord>,
    ) -> Self {
        Self {
            timestamp,
            base_currency: normalize_code(base_currency.as_ref()),
            records: dedupe(records),
        }
    }

    /// Seconds since the Unix epoch at which the feed collected these rates.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn records(&self) -> &[RateRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RateRecord> {
        self.records
    }

    pub fn get(&self, currency_code: &str) -> Option<&RateRecord> {
        let code = normalize_code(currency_code);
        self.records.iter().find(|r| r.currency_code == code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub(crate) fn dedupe(records: impl IntoIterator<Item = RateRecord>) -> Vec<RateRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<RateRecord> = Vec::new();
    for record in records {
        let record = RateRecord::new(&record.currency_code, record.rate);
        match positions.get(&record.currency_code) {
            Some(&idx) => out[idx] = record,
            None => {
                positions.insert(record.currency_code.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}
