//! Daily multi-analyst trading debate.
//!
//! Once per trading day and per (ticker, model, version) track, a set of
//! LLM analyst personas read market data and yesterday's position, each
//! proposes BUY / SELL / HOLD with an end-of-day position size, and the
//! plurality outcome is appended to the track's history.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use debate::models::DebateConfig;
//! # async fn run() -> anyhow::Result<()> {
//! let config = DebateConfig::default();
//! let ledger = debate::open_ledger(&config)?;
//! let data = debate::open_market(&config)?;
//! let runner = debate::build_runner(&config, "TSLA", ledger, data)?;
//! let report = runner.run_day(chrono::Local::now().date_naive()).await?;
//! println!("{}", report.state.decision);
//! # Ok(())
//! # }
//! ```

pub use debate_agents as agents;
pub use debate_data as data;
pub use debate_models as models;
pub use debate_store as store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use debate_agents::{aggregate_committed, Analyst, CliAnalyst, DayReport, DebateRunner, RunnerSettings};
use debate_data::{DataReader, MarketRecordStore};
use debate_models::{DebateConfig, DebateKey};
use debate_store::{Ledger, StateStore};
use tracing::{info, warn};

/// Open the debate store, creating the file and schema if needed.
pub fn open_ledger(config: &DebateConfig) -> Result<Arc<Ledger>, anyhow::Error> {
    let path = &config.store.sqlite_path;
    ensure_parent_dir(path)?;
    let store = StateStore::open(path).with_context(|| format!("Failed to open store: {path}"))?;
    Ok(Arc::new(Ledger::new(store)))
}

/// Open the market database read-only behind the hot cache.
pub fn open_market(config: &DebateConfig) -> Result<Arc<DataReader>, anyhow::Error> {
    let path = &config.data.sqlite_path;
    let sqlite = MarketRecordStore::open(path)
        .with_context(|| format!("Failed to open market data: {path}"))?;
    Ok(Arc::new(DataReader::new(
        sqlite,
        config.data.memory_max_capacity,
        Duration::from_secs(config.data.memory_ttl_seconds),
    )))
}

/// One CLI-backed analyst per enabled persona.
pub fn build_analysts(config: &DebateConfig) -> Vec<Arc<dyn Analyst>> {
    let timeout = Duration::from_secs(config.debate.analyst_timeout_seconds);
    config
        .enabled_personas()
        .map(|persona| {
            Arc::new(CliAnalyst::new(
                persona.clone(),
                config.debate.cli_command.clone(),
                &config.debate.analyst_model,
                timeout,
            )) as Arc<dyn Analyst>
        })
        .collect()
}

/// Build the runner for one ticker's track from configuration.
pub fn build_runner(
    config: &DebateConfig,
    ticker: &str,
    ledger: Arc<Ledger>,
    data: Arc<DataReader>,
) -> Result<DebateRunner, anyhow::Error> {
    config.validate().context("Invalid debate configuration")?;

    let key = config.key_for(ticker);
    let company = config.company(ticker);
    if !config.tickers.keys().any(|t| t.eq_ignore_ascii_case(ticker)) {
        warn!(ticker = %key.ticker, "Ticker is not configured, company name unknown");
    }

    Ok(DebateRunner::new(
        key,
        company,
        build_analysts(config),
        data,
        ledger,
        RunnerSettings::from(&config.debate),
    ))
}

/// Aggregate a ticker's committed opinions for `date`. Market data is not opened.
pub fn aggregate_day(
    config: &DebateConfig,
    ticker: &str,
    ledger: &Ledger,
    date: NaiveDate,
) -> Result<DayReport, anyhow::Error> {
    let key = config.key_for(ticker);
    aggregate_committed(ledger, &key, &RunnerSettings::from(&config.debate), date)
        .with_context(|| format!("Aggregation failed for {key}"))
}

/// Seed a genesis row for every configured ticker. Returns each track and
/// whether it was newly seeded.
pub fn init_tracks(
    config: &DebateConfig,
    ledger: &Ledger,
    date: NaiveDate,
) -> Result<Vec<(DebateKey, bool)>, anyhow::Error> {
    let mut seeded = Vec::new();
    for ticker in config.tickers.keys() {
        let key = config.key_for(ticker);
        let created = ledger
            .seed_genesis(&key, date)
            .with_context(|| format!("Failed to seed {key}"))?;
        if created {
            info!(key = %key, date = %date, "Track initialised");
        } else {
            info!(key = %key, "Track already has history");
        }
        seeded.push((key, created));
    }
    Ok(seeded)
}

fn ensure_parent_dir(path: &str) -> Result<(), anyhow::Error> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
