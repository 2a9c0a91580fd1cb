mod json_file;
mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;

use crate::models::RateRecord;

/// Durable key-indexed table of rate records, keyed by currency code.
#[async_trait::async_trait]
pub trait RateTable: Send + Sync {
    /// Discard every record and store `records` in their place.
    ///
    /// Readers must observe either the old set or the new set, never a mix.
    async fn replace_all(&self, records: &[RateRecord]) -> Result<()>;

    async fn all(&self) -> Result<Vec<RateRecord>>;

    async fn get(&self, currency_code: &str) -> Result<Option<RateRecord>>;

    async fn clear(&self) -> Result<()>;
}

/// Preference-style scalar store for sync bookkeeping.
///
/// Written independently of the [`RateTable`]; values read as `None` until set.
#[async_trait::async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn last_sync_timestamp(&self) -> Result<Option<i64>>;
    async fn set_last_sync_timestamp(&self, timestamp: i64) -> Result<()>;

    async fn base_currency(&self) -> Result<Option<String>>;
    async fn set_base_currency(&self, code: &str) -> Result<()>;
}
