//! The local tier: durable rates plus change notification.

mod subscription;

pub use subscription::SUBSCRIBER_BUFFER;

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::models::{dedupe, normalize_code, RateRecord, RateSnapshot};
use crate::observable::{ObservableResult, Observation};
use crate::storage::{MemoryStorage, RateTable, SyncStateStore};

use subscription::Broadcaster;

/// Base currency reported before any sync has recorded one.
pub const DEFAULT_BASE_CURRENCY: &str = "EUR";

/// Last sync timestamp reported before any sync has recorded one.
pub const NEVER_SYNCED: i64 = 0;

/// Owns the persisted rate set and the subscriber registry.
///
/// Mutations (`replace_all`, `delete_all`) are linearized with reads and with
/// subscription registration, so readers see either the old record set or the
/// new one and every subscriber sees mutations in the same order.
///
/// The record table and the two scalar fields are separate writes. A reader
/// running between them can see new records next to the previous timestamp
/// and base currency.
pub struct LocalStore {
    table: Arc<dyn RateTable>,
    state: Arc<dyn SyncStateStore>,
    gate: RwLock<()>,
    feed: Broadcaster<Vec<RateRecord>>,
}

impl LocalStore {
    pub fn new(table: Arc<dyn RateTable>, state: Arc<dyn SyncStateStore>) -> Self {
        Self {
            table,
            state,
            gate: RwLock::new(()),
            feed: Broadcaster::new(),
        }
    }

    /// A store backed by one substrate that provides both the table and the scalars.
    pub fn with_storage<S>(storage: Arc<S>) -> Self
    where
        S: RateTable + SyncStateStore + 'static,
    {
        Self::new(storage.clone(), storage)
    }

    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    /// Replace every stored record with `snapshot`'s, then record its timestamp
    /// and base currency.
    ///
    /// Subscribers are notified once, after the record write and before the
    /// scalar writes. If a scalar write fails the new records stay in place and
    /// the error is returned.
    pub async fn replace_all(&self, snapshot: &RateSnapshot) -> StoreResult<()> {
        {
            let _guard = self.gate.write().await;
            self.table
                .replace_all(snapshot.records())
                .await
                .map_err(StoreError::io)?;
            let delivered = self
                .feed
                .publish(ObservableResult::Success(snapshot.records().to_vec()));
            debug!(
                records = snapshot.len(),
                subscribers = delivered,
                "rate table replaced"
            );
        }

        self.state
            .set_last_sync_timestamp(snapshot.timestamp())
            .await
            .map_err(StoreError::io)?;
        self.state
            .set_base_currency(snapshot.base_currency())
            .await
            .map_err(StoreError::io)?;
        Ok(())
    }

    /// Current records with the persisted timestamp and base currency.
    ///
    /// An empty table is a valid, empty snapshot.
    pub async fn get_all(&self) -> StoreResult<RateSnapshot> {
        let records = {
            let _guard = self.gate.read().await;
            self.read_records().await.map_err(StoreError::io)?
        };
        let timestamp = self.get_last_sync_timestamp().await?;
        let base = self.get_base_currency().await?;
        Ok(RateSnapshot::new(timestamp, base, records))
    }

    pub async fn get_one(&self, currency_code: &str) -> StoreResult<RateRecord> {
        let code = normalize_code(currency_code);
        let _guard = self.gate.read().await;
        self.table
            .get(&code)
            .await
            .map_err(StoreError::io)?
            .ok_or(StoreError::NotFound(code))
    }

    /// Clear the record table. The sync timestamp and base currency are kept.
    pub async fn delete_all(&self) -> StoreResult<()> {
        let _guard = self.gate.write().await;
        self.table.clear().await.map_err(StoreError::io)?;
        let delivered = self.feed.publish(ObservableResult::Success(Vec::new()));
        debug!(subscribers = delivered, "rate table cleared");
        Ok(())
    }

    /// Re-read the record table and notify subscribers if it no longer matches
    /// what they last saw.
    ///
    /// Notifications only cover mutations made through this store. Call this
    /// to pick up changes another process made to shared storage. Returns
    /// whether anything was published.
    pub async fn reload(&self) -> StoreResult<bool> {
        let _guard = self.gate.write().await;
        let records = self.read_records().await.map_err(StoreError::io)?;
        let count = records.len();
        match self.feed.publish_if_changed(ObservableResult::Success(records)) {
            Some(delivered) => {
                debug!(records = count, subscribers = delivered, "rate table changed on reload");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stream of the whole record set: the current set first, then one
    /// emission per `replace_all`, `delete_all` or changing `reload`.
    ///
    /// Each subscriber may fall at most
    /// [`SUBSCRIBER_BUFFER`] emissions behind;
    /// past that it is disconnected and its stream ends. Poll the stream or
    /// drop it.
    pub async fn subscribe_all(&self) -> Observation<Vec<RateRecord>> {
        let _guard = self.gate.read().await;
        let current: ObservableResult<Vec<RateRecord>> = match self.read_records().await {
            Ok(records) => ObservableResult::Success(records),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read rates for new subscriber");
                ObservableResult::Error(StoreError::io(err).into())
            }
        };
        self.feed.subscribe(current)
    }

    /// Stream of one currency's record, derived from [`subscribe_all`](Self::subscribe_all).
    ///
    /// Emits `NotFound` whenever the record is absent from the current set.
    pub async fn subscribe_one(&self, currency_code: &str) -> Observation<RateRecord> {
        let code = normalize_code(currency_code);
        self.subscribe_all()
            .await
            .map(move |state| {
                state.and_then(|records| {
                    match records.into_iter().find(|r| r.currency_code == code) {
                        Some(record) => ObservableResult::Success(record),
                        None => ObservableResult::Error(StoreError::NotFound(code.clone()).into()),
                    }
                })
            })
            .boxed()
    }

    pub async fn get_last_sync_timestamp(&self) -> StoreResult<i64> {
        Ok(self
            .state
            .last_sync_timestamp()
            .await
            .map_err(StoreError::io)?
            .unwrap_or(NEVER_SYNCED))
    }

    pub async fn get_base_currency(&self) -> StoreResult<String> {
        Ok(self
            .state
            .base_currency()
            .await
            .map_err(StoreError::io)?
            .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string()))
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    /// Table rows in canonical form: normalized codes, one record per code.
    async fn read_records(&self) -> anyhow::Result<Vec<RateRecord>> {
        Ok(dedupe(self.table.all().await?))
    }
}
