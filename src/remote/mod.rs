//! The remote tier: a single capability to fetch the latest snapshot.

#[cfg(feature = "remote")]
pub mod fixer;

#[cfg(feature = "remote")]
pub use fixer::FixerRateSource;

use crate::error::NetworkResult;
use crate::models::RateSnapshot;

/// Default endpoint of the fixer-style latest-rates API.
pub const FIXER_BASE_URL: &str = "http://data.fixer.io/api";

/// Fetches the latest complete snapshot from an external feed.
///
/// Implementations do not cache, do not retry, and never return a partial
/// snapshot: any transport, status or decoding failure is a `NetworkError`.
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self) -> NetworkResult<RateSnapshot>;

    fn name(&self) -> &str;
}
