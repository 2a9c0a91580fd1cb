#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ratebook::clock::ManualClock;
use ratebook::error::{NetworkError, NetworkResult};
use ratebook::local::LocalStore;
use ratebook::models::{RateRecord, RateSnapshot};
use ratebook::remote::RemoteSource;
use ratebook::storage::{MemoryStorage, RateTable, SyncStateStore};
use ratebook::sync::SyncCoordinator;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn snapshot(timestamp: i64, records: &[(&str, f64)]) -> RateSnapshot {
    RateSnapshot::new(
        timestamp,
        "EUR",
        records.iter().map(|(code, rate)| RateRecord::new(code, *rate)),
    )
}

pub fn codes(records: &[RateRecord]) -> Vec<String> {
    let mut codes: Vec<String> = records.iter().map(|r| r.currency_code.clone()).collect();
    codes.sort();
    codes
}

/// Remote source returning a configurable outcome and counting calls.
pub struct FakeRemoteSource {
    outcome: Mutex<NetworkResult<RateSnapshot>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeRemoteSource {
    pub fn returning(snapshot: RateSnapshot) -> Self {
        Self {
            outcome: Mutex::new(Ok(snapshot)),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn failing(err: NetworkError) -> Self {
        let source = Self::returning(snapshot(0, &[]));
        source.fail_with(err);
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_with(&self, err: NetworkError) {
        *self.outcome.lock().unwrap() = Err(err);
    }

    pub fn succeed_with(&self, snapshot: RateSnapshot) {
        *self.outcome.lock().unwrap() = Ok(snapshot);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeRemoteSource {
    async fn fetch(&self) -> NetworkResult<RateSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcome.lock().unwrap().clone()
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Memory-backed storage whose reads or writes can be made to fail.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("simulated read failure");
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        Ok(())
    }
}

#[async_trait]
impl RateTable for FlakyStorage {
    async fn replace_all(&self, records: &[RateRecord]) -> Result<()> {
        self.check_write()?;
        self.inner.replace_all(records).await
    }

    async fn all(&self) -> Result<Vec<RateRecord>> {
        self.check_read()?;
        self.inner.all().await
    }

    async fn get(&self, currency_code: &str) -> Result<Option<RateRecord>> {
        self.check_read()?;
        RateTable::get(&self.inner, currency_code).await
    }

    async fn clear(&self) -> Result<()> {
        self.check_write()?;
        self.inner.clear().await
    }
}

#[async_trait]
impl SyncStateStore for FlakyStorage {
    async fn last_sync_timestamp(&self) -> Result<Option<i64>> {
        self.inner.last_sync_timestamp().await
    }

    async fn set_last_sync_timestamp(&self, timestamp: i64) -> Result<()> {
        self.inner.set_last_sync_timestamp(timestamp).await
    }

    async fn base_currency(&self) -> Result<Option<String>> {
        self.inner.base_currency().await
    }

    async fn set_base_currency(&self, code: &str) -> Result<()> {
        self.inner.set_base_currency(code).await
    }
}

/// Coordinator over an in-memory store seeded with EGP and AED synced at
/// [`start_time`], a manual clock at that instant, and a remote that would
/// answer with USD.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub remote: Arc<FakeRemoteSource>,
    pub local: Arc<LocalStore>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl Harness {
    pub async fn seeded() -> Self {
        Self::seeded_with_store(Arc::new(LocalStore::in_memory())).await
    }

    pub async fn seeded_with_store(local: Arc<LocalStore>) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        local
            .replace_all(&snapshot(
                start_time().timestamp(),
                &[("EGP", 18.786627), ("AED", 4.401362)],
            ))
            .await
            .expect("seeding the store should succeed");

        let remote = Arc::new(FakeRemoteSource::returning(snapshot(
            start_time().timestamp() + 2 * 60 * 60,
            &[("USD", 1.198235)],
        )));
        let coordinator = Arc::new(
            SyncCoordinator::new(remote.clone(), local.clone()).with_clock(clock.clone()),
        );

        Self {
            clock,
            remote,
            local,
            coordinator,
        }
    }

    /// Move the clock just past the default one-hour threshold.
    pub fn expire(&self) {
        self.clock.advance(chrono::Duration::minutes(61));
    }
}
