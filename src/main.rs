use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use secrecy::SecretString;
use tokio::time::MissedTickBehavior;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ratebook::config::{default_config_path, ResolvedConfig};
use ratebook::duration::{format_duration, parse_duration};
use ratebook::local::LocalStore;
use ratebook::models::RateRecord;
use ratebook::observable::{ObservableResult, Observation};
use ratebook::remote::FixerRateSource;
use ratebook::storage::JsonFileStorage;
use ratebook::sync::{ServeStale, SyncCoordinator};

#[derive(Parser)]
#[command(name = "ratebook")]
#[command(about = "Offline-first exchange rates")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the staleness threshold (e.g. "30m", "1h")
    #[arg(long, value_parser = parse_duration)]
    staleness: Option<Duration>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all rates, refreshing first if the cache is stale
    Rates,
    /// Show one cached rate
    Rate { currency: String },
    /// Convert an amount of the base currency using a cached rate
    Convert { amount: f64, currency: String },
    /// Fetch the latest rates now
    Refresh,
    /// Delete all cached rates
    Clear,
    /// Show the base currency of the cached rates
    Base,
    /// Show when rates were last synced and whether they are stale
    Status,
    /// Print every change to the cached rates until interrupted
    Watch {
        currency: Option<String>,

        /// How often to refresh stale rates and re-read the store
        #[arg(long, value_parser = parse_duration, default_value = "1m")]
        interval: Duration,
    },
    /// Show current configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ratebook=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}

fn print_rates(records: &[RateRecord]) {
    for record in records {
        println!("{} {}", record.currency_code, record.rate);
    }
}

fn print_observation<T>(state: &ObservableResult<T>, render: impl Fn(&T)) {
    match state {
        ObservableResult::Loading => println!("loading..."),
        ObservableResult::Success(value) => render(value),
        ObservableResult::Error(err) => println!("could not load rates: {err}"),
    }
}

async fn poll_rates(coordinator: &Arc<SyncCoordinator>, serve_stale: bool) {
    let refreshed = if serve_stale {
        ServeStale::new(coordinator.clone()).get_rates().await
    } else {
        coordinator.get_rates().await
    };
    if let Err(err) = refreshed {
        warn!(error = %err, "watch refresh failed");
    }
    // Other processes write the same data directory.
    if let Err(err) = coordinator.local().reload().await {
        warn!(error = %err, "failed to reload cached rates");
    }
}

async fn watch<T>(
    coordinator: &Arc<SyncCoordinator>,
    serve_stale: bool,
    mut stream: Observation<T>,
    every: Duration,
    render: impl Fn(&T),
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => poll_rates(coordinator, serve_stale).await,
            next = stream.next() => match next {
                Some(state) => print_observation(&state, &render),
                None => {
                    warn!("watch fell too far behind, stopping");
                    break;
                }
            },
        }
    }
}

fn build_coordinator(config: &ResolvedConfig, api_key: Option<SecretString>) -> SyncCoordinator {
    let storage = Arc::new(JsonFileStorage::new(&config.data_dir));
    let local = Arc::new(LocalStore::with_storage(storage));

    let mut remote = FixerRateSource::new(config.base_currency.clone())
        .with_base_url(config.feed.endpoint.clone())
        .with_timeout(config.feed.timeout);
    if let Some(key) = api_key {
        remote = remote.with_api_key(key);
    }

    SyncCoordinator::new(Arc::new(remote), local)
        .with_staleness_threshold(config.refresh.staleness)
        .with_single_flight(config.refresh.single_flight)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = ResolvedConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    if let Some(staleness) = cli.staleness {
        config.refresh.staleness = staleness;
    }

    let has_api_key = config.api_key.is_some();
    let api_key = config.api_key.take();
    let coordinator = Arc::new(build_coordinator(&config, api_key));

    match cli.command {
        Command::Rates => {
            let records = if config.refresh.serve_stale_on_error {
                ServeStale::new(coordinator.clone()).get_rates().await?
            } else {
                coordinator.get_rates().await?
            };
            print_rates(&records);
        }
        Command::Rate { currency } => {
            let record = coordinator.get_rate(&currency).await?;
            print_rates(std::slice::from_ref(&record));
        }
        Command::Convert { amount, currency } => {
            let record = coordinator.get_rate(&currency).await?;
            let base = coordinator.get_base_currency().await?;
            println!(
                "{amount} {base} = {} {}",
                record.convert(amount),
                record.currency_code
            );
        }
        Command::Refresh => {
            let snapshot = coordinator.refresh().await?;
            println!(
                "Fetched {} rates against {}",
                snapshot.len(),
                snapshot.base_currency()
            );
        }
        Command::Clear => {
            coordinator.delete_all().await?;
            println!("Cleared cached rates");
        }
        Command::Base => {
            println!("{}", coordinator.get_base_currency().await?);
        }
        Command::Status => {
            let last_sync = coordinator.local().get_last_sync_timestamp().await?;
            let check = coordinator.staleness().await?;
            let synced_at = Utc
                .timestamp_opt(last_sync, 0)
                .single()
                .filter(|_| check.age.is_some())
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!("Last sync: {synced_at}");
            println!(
                "Age:       {}",
                check.age.map(format_duration).unwrap_or_else(|| "-".to_string())
            );
            println!("Threshold: {}", format_duration(check.threshold));
            println!("Status:    {}", if check.is_stale { "stale" } else { "fresh" });
        }
        Command::Watch { currency, interval } => {
            let serve_stale = config.refresh.serve_stale_on_error;
            match currency {
                Some(code) => {
                    let stream = coordinator.observe_one(&code).await;
                    watch(&coordinator, serve_stale, stream, interval, |r| {
                        print_rates(std::slice::from_ref(r))
                    })
                    .await;
                }
                None => {
                    let stream = coordinator.observe_all().await;
                    watch(&coordinator, serve_stale, stream, interval, |r| print_rates(r)).await;
                }
            }
        }
        Command::Config => {
            println!("Config file: {}", config_path.display());
            println!("Data directory: {}", config.data_dir.display());
            println!("Base currency: {}", config.base_currency);
            println!("Feed endpoint: {}", config.feed.endpoint);
            println!(
                "API key: {}",
                if has_api_key { "set" } else { "not set" }
            );
            println!("Fetch timeout: {}", format_duration(config.feed.timeout));
            println!("Staleness: {}", format_duration(config.refresh.staleness));
            println!("Single-flight refresh: {}", config.refresh.single_flight);
            println!("Serve stale on error: {}", config.refresh.serve_stale_on_error);
        }
    }

    Ok(())
}
