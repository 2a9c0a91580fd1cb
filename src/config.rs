use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::local::DEFAULT_BASE_CURRENCY;
use crate::remote::FIXER_BASE_URL;
use crate::staleness::DEFAULT_STALENESS_THRESHOLD;

/// Environment variable that overrides `feed.api_key`.
pub const API_KEY_ENV: &str = "RATEBOOK_API_KEY";

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_endpoint() -> String {
    FIXER_BASE_URL.to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_staleness() -> Duration {
    DEFAULT_STALENESS_THRESHOLD
}

/// Remote feed settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Base URL of the latest-rates API.
    pub endpoint: String,

    /// Access key sent with every request. `RATEBOOK_API_KEY` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Give up on a fetch after this long.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout: default_fetch_timeout(),
        }
    }
}

/// Refresh/staleness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// How old cached rates can be before a bulk read refreshes them.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub staleness: Duration,

    /// Serialize overlapping refreshes.
    pub single_flight: bool,

    /// Serve cached rates when a stale read cannot reach the feed.
    pub serve_stale_on_error: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            staleness: default_staleness(),
            single_flight: false,
            serve_stale_on_error: false,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Currency the feed is asked to quote against.
    pub base_currency: String,

    pub feed: FeedConfig,

    pub refresh: RefreshConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            base_currency: default_base_currency(),
            feed: FeedConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }

    fn resolve(self, config_dir: &Path) -> ResolvedConfig {
        let data_dir = self.resolve_data_dir(config_dir);
        let env_key = std::env::var(API_KEY_ENV).ok();
        let mut feed = self.feed;
        // The key lives only in `ResolvedConfig::api_key` from here on.
        let file_key = feed.api_key.take();
        ResolvedConfig {
            data_dir,
            base_currency: self.base_currency.trim().to_uppercase(),
            api_key: resolve_api_key(file_key.as_deref(), env_key),
            feed,
            refresh: self.refresh,
        }
    }
}

/// Pick the API key: a non-empty environment value wins over the file value.
pub fn resolve_api_key(from_file: Option<&str>, from_env: Option<String>) -> Option<SecretString> {
    from_env
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            from_file
                .filter(|key| !key.trim().is_empty())
                .map(str::to_string)
        })
        .map(SecretString::from)
}

/// Loaded configuration with resolved paths and secrets.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub base_currency: String,
    pub feed: FeedConfig,
    pub api_key: Option<SecretString>,
    pub refresh: RefreshConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./ratebook.toml` if it exists in current directory
/// 2. `~/.local/share/ratebook/ratebook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("ratebook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("ratebook").join("ratebook.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    ///
    /// The data directory is resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        Ok(Config::load(&config_path)?.resolve(config_dir))
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// Without a file, the config file's intended parent directory is the data directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Config::default().resolve(config_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_relative_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("data")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_data_dir(Path::new("/home/user/rates")),
            PathBuf::from("/home/user/rates/data")
        );
    }

    #[test]
    fn test_absolute_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("/var/ratebook")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_data_dir(Path::new("/home/user/rates")),
            PathBuf::from("/var/ratebook")
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_currency, "EUR");
        assert_eq!(config.refresh.staleness, Duration::from_secs(60 * 60));
        assert!(!config.refresh.single_flight);
        assert!(!config.refresh.serve_stale_on_error);
        assert_eq!(config.feed.timeout, Duration::from_secs(30));
        assert_eq!(config.feed.endpoint, "http://data.fixer.io/api");
    }

    #[test]
    fn test_load_full_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("ratebook.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "data_dir = \"./data\"")?;
        writeln!(file, "base_currency = \"usd\"")?;
        writeln!(file, "[feed]")?;
        writeln!(file, "endpoint = \"http://localhost:9000/api\"")?;
        writeln!(file, "api_key = \"abc123\"")?;
        writeln!(file, "timeout = \"5s\"")?;
        writeln!(file, "[refresh]")?;
        writeln!(file, "staleness = \"30m\"")?;
        writeln!(file, "single_flight = true")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.feed.timeout, Duration::from_secs(5));
        assert_eq!(config.refresh.staleness, Duration::from_secs(30 * 60));
        assert!(config.refresh.single_flight);
        assert!(!config.refresh.serve_stale_on_error);

        let resolved = ResolvedConfig::load(&config_path)?;
        assert_eq!(resolved.base_currency, "USD");
        assert_eq!(resolved.data_dir, dir.path().canonicalize()?.join("./data"));
        assert_eq!(resolved.feed.endpoint, "http://localhost:9000/api");

        Ok(())
    }

    #[test]
    fn test_bad_duration_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("ratebook.toml");
        std::fs::write(&config_path, "[refresh]\nstaleness = \"soon\"\n")?;

        let err = Config::load(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
        Ok(())
    }

    #[test]
    fn test_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("ratebook.toml");

        let resolved = ResolvedConfig::load_or_default(&config_path)?;
        assert_eq!(resolved.data_dir, dir.path());
        assert_eq!(resolved.base_currency, "EUR");
        Ok(())
    }

    #[test]
    fn test_env_api_key_wins() {
        let key = resolve_api_key(Some("from-file"), Some("from-env".to_string()));
        assert_eq!(key.as_ref().map(|k| k.expose_secret()), Some("from-env"));

        let key = resolve_api_key(Some("from-file"), Some("  ".to_string()));
        assert_eq!(key.as_ref().map(|k| k.expose_secret()), Some("from-file"));

        assert!(resolve_api_key(None, None).is_none());
    }

    #[test]
    fn test_config_serializes_durations_in_human_form() -> Result<()> {
        let rendered = toml::to_string(&Config::default())?;
        assert!(rendered.contains("staleness = \"1h\""));
        assert!(rendered.contains("timeout = \"30s\""));
        Ok(())
    }

    #[test]
    fn test_api_key_never_appears_in_debug() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("ratebook.toml");
        std::fs::write(&config_path, "[feed]\napi_key = \"hunter2-secret\"\n")?;

        let config = Config::load(&config_path)?;
        assert!(!format!("{config:?}").contains("hunter2-secret"));

        let resolved = ResolvedConfig::load(&config_path)?;
        let rendered = format!("{resolved:?}");
        assert!(!rendered.contains("hunter2-secret"), "{rendered}");
        assert!(resolved.feed.api_key.is_none());
        assert!(resolved.api_key.is_some());
        Ok(())
    }

    #[test]
    fn test_default_endpoint_matches_feed_adapter() {
        assert_eq!(FeedConfig::default().endpoint, FIXER_BASE_URL);
    }
}
