//! Opt-in availability policy layered over [`SyncCoordinator`].

use std::sync::Arc;

use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::models::RateRecord;

use super::SyncCoordinator;

/// Serves whatever is cached when a stale read cannot reach the feed.
///
/// Only network failures are masked. Store failures still surface, and a
/// successful refresh behaves exactly like the coordinator.
pub struct ServeStale {
    coordinator: Arc<SyncCoordinator>,
}

impl ServeStale {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn get_rates(&self) -> SyncResult<Vec<RateRecord>> {
        match self.coordinator.get_rates().await {
            Err(SyncError::Network(err)) => {
                warn!(error = %err, "refresh failed, serving cached rates");
                let snapshot = self.coordinator.local().get_all().await?;
                Ok(snapshot.into_records())
            }
            other => other,
        }
    }
}
