//! Fixer-style "latest rates" feed adapter.
//!
//! `GET {endpoint}/latest?base=EUR&access_key=...` answers with
//! `{"success": true, "timestamp": ..., "base": "EUR", "date": "...", "rates": {"USD": 1.19, ...}}`.
//! Errors come back as HTTP 200 with `"success": false` and an `error` object.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::{NetworkError, NetworkResult};
use crate::models::{RateRecord, RateSnapshot};

use super::{RemoteSource, FIXER_BASE_URL};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    rates: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    info: Option<String>,
}

/// Decode a latest-rates payload into a snapshot.
///
/// Any subset and order of currency keys is accepted. A payload without
/// `rates`, `timestamp` or `base`, or with a non-numeric rate, is malformed.
pub fn parse_latest(body: &str) -> NetworkResult<RateSnapshot> {
    let response: LatestResponse =
        serde_json::from_str(body).map_err(|e| NetworkError::Malformed(e.to_string()))?;

    if response.success == Some(false) {
        let error = response.error.unwrap_or(ApiError {
            code: 0,
            kind: None,
            info: None,
        });
        let info = error
            .info
            .or(error.kind)
            .unwrap_or_else(|| "unspecified error".to_string());
        return Err(NetworkError::Api {
            code: error.code,
            info,
        });
    }

    let rates = response
        .rates
        .ok_or_else(|| NetworkError::Malformed("missing rates".to_string()))?;
    let timestamp = response
        .timestamp
        .ok_or_else(|| NetworkError::Malformed("missing timestamp".to_string()))?;
    let base = response
        .base
        .ok_or_else(|| NetworkError::Malformed("missing base".to_string()))?;

    debug!(
        base = %base,
        date = response.date.as_deref().unwrap_or("-"),
        currencies = rates.len(),
        "decoded latest rates"
    );

    Ok(RateSnapshot::new(
        timestamp,
        base,
        rates
            .into_iter()
            .map(|(code, rate)| RateRecord::new(code, rate)),
    ))
}

fn classify(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout
    } else if err.is_decode() {
        NetworkError::Malformed(err.to_string())
    } else {
        NetworkError::Transport(err.to_string())
    }
}

/// Rate feed over HTTP.
#[derive(Debug)]
pub struct FixerRateSource {
    client: Client,
    base_url: String,
    base_currency: String,
    api_key: Option<SecretString>,
    timeout: Option<Duration>,
}

impl FixerRateSource {
    /// Creates a source requesting `base_currency` rates with a default HTTP client.
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: FIXER_BASE_URL.to_string(),
            base_currency: base_currency.into(),
            api_key: None,
            timeout: None,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Per-request timeout; expiry surfaces as [`NetworkError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn latest_url(&self) -> String {
        format!("{}/latest", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl RemoteSource for FixerRateSource {
    async fn fetch(&self) -> NetworkResult<RateSnapshot> {
        let mut request = self
            .client
            .get(self.latest_url())
            .query(&[("base", self.base_currency.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("access_key", key.expose_secret())]);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        debug!(url = %self.latest_url(), base = %self.base_currency, "fetching latest rates");
        let response = request.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(classify)?;
        parse_latest(&body)
    }

    fn name(&self) -> &str {
        "fixer"
    }
}
