//! Reconciles the remote feed with the local store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::SyncResult;
use crate::local::LocalStore;
use crate::models::{RateRecord, RateSnapshot};
use crate::observable::Observation;
use crate::remote::RemoteSource;
use crate::staleness::{
    check_rates_staleness, log_rates_staleness, StalenessCheck, DEFAULT_STALENESS_THRESHOLD,
};

/// Answers rate queries from the local store, refreshing from the remote
/// source when a bulk read finds the cache stale.
///
/// Holds no rate data itself; the local store owns the only copy.
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteSource>,
    local: Arc<LocalStore>,
    staleness_threshold: Duration,
    clock: Arc<dyn Clock>,
    refresh_gate: Option<Mutex<()>>,
}

impl SyncCoordinator {
    pub fn new(remote: Arc<dyn RemoteSource>, local: Arc<LocalStore>) -> Self {
        Self {
            remote,
            local,
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            clock: Arc::new(SystemClock),
            refresh_gate: None,
        }
    }

    pub fn with_staleness_threshold(mut self, threshold: Duration) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serialize overlapping `refresh` calls instead of letting the last writer win.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.refresh_gate = enabled.then(|| Mutex::new(()));
        self
    }

    pub fn staleness_threshold(&self) -> Duration {
        self.staleness_threshold
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    /// Age of the cached rates relative to the threshold, as of now.
    pub async fn staleness(&self) -> SyncResult<StalenessCheck> {
        let last_sync = self.local.get_last_sync_timestamp().await?;
        Ok(check_rates_staleness(
            last_sync,
            self.clock.now(),
            self.staleness_threshold,
        ))
    }

    /// All cached rates, refreshed first if the cache is stale.
    ///
    /// A failed refresh is returned as-is; stale local data is never served
    /// in its place.
    pub async fn get_rates(&self) -> SyncResult<Vec<RateRecord>> {
        let check = self.staleness().await?;
        log_rates_staleness(self.remote.name(), &check);

        if check.is_stale {
            self.refresh().await?;
        }

        let snapshot = self.local.get_all().await?;
        Ok(snapshot.into_records())
    }

    /// Fetch the latest snapshot and replace the local rates with it.
    ///
    /// On fetch failure the local store is left untouched.
    pub async fn refresh(&self) -> SyncResult<RateSnapshot> {
        let _flight = match &self.refresh_gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let snapshot = match self.remote.fetch().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(source = self.remote.name(), error = %err, "rate refresh failed");
                return Err(err.into());
            }
        };

        self.local.replace_all(&snapshot).await?;
        info!(
            source = self.remote.name(),
            base = snapshot.base_currency(),
            timestamp = snapshot.timestamp(),
            records = snapshot.len(),
            "rates refreshed"
        );
        Ok(snapshot)
    }

    /// One cached rate. No staleness check is applied on this path.
    pub async fn get_rate(&self, currency_code: &str) -> SyncResult<RateRecord> {
        debug!(currency = currency_code, "looking up rate from store only");
        Ok(self.local.get_one(currency_code).await?)
    }

    pub async fn observe_all(&self) -> Observation<Vec<RateRecord>> {
        self.local.subscribe_all().await
    }

    pub async fn observe_one(&self, currency_code: &str) -> Observation<RateRecord> {
        self.local.subscribe_one(currency_code).await
    }

    pub async fn delete_all(&self) -> SyncResult<()> {
        Ok(self.local.delete_all().await?)
    }

    pub async fn get_base_currency(&self) -> SyncResult<String> {
        Ok(self.local.get_base_currency().await?)
    }
}
