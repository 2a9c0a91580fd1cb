use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::models::RateRecord;

use super::{RateTable, SyncStateStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SyncStateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_sync_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_currency: Option<String>,
}

/// JSON file-based storage implementation.
///
/// Directory structure:
/// ```text
/// data/
///   rates.json        # the record table
///   sync_state.json   # last sync timestamp and base currency
/// ```
///
/// Every write goes to a sibling temporary file which is then renamed over
/// the target, so readers see either the previous file or the new one.
pub struct JsonFileStorage {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn rates_file(&self) -> PathBuf {
        self.base_path.join("rates.json")
    }

    fn sync_state_file(&self) -> PathBuf {
        self.base_path.join("sync_state.json")
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .context("Failed to create data directory")?;

        let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }

    async fn read_sync_state(&self) -> Result<SyncStateFile> {
        Ok(self
            .read_json(&self.sync_state_file())
            .await?
            .unwrap_or_default())
    }

    async fn update_sync_state(&self, apply: impl FnOnce(&mut SyncStateFile)) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_sync_state().await?;
        apply(&mut state);
        self.write_json_atomic(&self.sync_state_file(), &state).await
    }
}

#[async_trait::async_trait]
impl RateTable for JsonFileStorage {
    async fn replace_all(&self, records: &[RateRecord]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_json_atomic(&self.rates_file(), &records).await
    }

    async fn all(&self) -> Result<Vec<RateRecord>> {
        Ok(self
            .read_json(&self.rates_file())
            .await?
            .unwrap_or_default())
    }

    async fn get(&self, currency_code: &str) -> Result<Option<RateRecord>> {
        let records = self.all().await?;
        Ok(records
            .into_iter()
            .find(|r| r.currency_code == currency_code))
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_json_atomic(&self.rates_file(), &Vec::<RateRecord>::new())
            .await
    }
}

#[async_trait::async_trait]
impl SyncStateStore for JsonFileStorage {
    async fn last_sync_timestamp(&self) -> Result<Option<i64>> {
        Ok(self.read_sync_state().await?.last_sync_timestamp)
    }

    async fn set_last_sync_timestamp(&self, timestamp: i64) -> Result<()> {
        self.update_sync_state(|state| state.last_sync_timestamp = Some(timestamp))
            .await
    }

    async fn base_currency(&self) -> Result<Option<String>> {
        Ok(self.read_sync_state().await?.base_currency)
    }

    async fn set_base_currency(&self, code: &str) -> Result<()> {
        let code = code.to_string();
        self.update_sync_state(move |state| state.base_currency = Some(code))
            .await
    }
}
