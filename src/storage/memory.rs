//! In-memory storage, used in tests and by embedders that do not need durability.

use anyhow::Result;
use tokio::sync::Mutex;

use crate::models::RateRecord;

use super::{RateTable, SyncStateStore};

#[derive(Debug, Default)]
struct SyncState {
    last_sync_timestamp: Option<i64>,
    base_currency: Option<String>,
}

/// In-memory rate table and sync state.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<RateRecord>>,
    state: Mutex<SyncState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RateTable for MemoryStorage {
    async fn replace_all(&self, records: &[RateRecord]) -> Result<()> {
        let mut table = self.records.lock().await;
        *table = records.to_vec();
        Ok(())
    }

    async fn all(&self) -> Result<Vec<RateRecord>> {
        Ok(self.records.lock().await.clone())
    }

    async fn get(&self, currency_code: &str) -> Result<Option<RateRecord>> {
        let table = self.records.lock().await;
        Ok(table
            .iter()
            .find(|r| r.currency_code == currency_code)
            .cloned())
    }

    async fn clear(&self) -> Result<()> {
        self.records.lock().await.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl SyncStateStore for MemoryStorage {
    async fn last_sync_timestamp(&self) -> Result<Option<i64>> {
        Ok(self.state.lock().await.last_sync_timestamp)
    }

    async fn set_last_sync_timestamp(&self, timestamp: i64) -> Result<()> {
        self.state.lock().await.last_sync_timestamp = Some(timestamp);
        Ok(())
    }

    async fn base_currency(&self) -> Result<Option<String>> {
        Ok(self.state.lock().await.base_currency.clone())
    }

    async fn set_base_currency(&self, code: &str) -> Result<()> {
        self.state.lock().await.base_currency = Some(code.to_string());
        Ok(())
    }
}
