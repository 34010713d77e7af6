use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use debate_models::DebateConfig;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "debate", about = "Daily multi-analyst trading debate")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/debate.toml")]
    config: String,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema and seed a genesis row for every configured ticker
    Init {
        /// Genesis date (defaults to yesterday)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run a full trading day for one ticker
    Run {
        #[arg(short, long)]
        ticker: String,
        /// Trading date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Aggregate opinions already committed for a day
    Aggregate {
        #[arg(short, long)]
        ticker: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print a ticker's DailyState history
    History {
        #[arg(short, long)]
        ticker: String,
    },
}

fn load_config(path: &str) -> Result<DebateConfig> {
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| "Failed to parse config")
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Init { date } => {
            let date = date.unwrap_or(today - Duration::days(1));
            let ledger = debate::open_ledger(&config)?;
            let seeded = debate::init_tracks(&config, &ledger, date)?;

            match debate::open_market(&config) {
                Ok(data) => {
                    for ticker in config.tickers.keys() {
                        let folders = data.available_folders(ticker)?;
                        if folders.is_empty() {
                            warn!(ticker = %ticker, "No market data loaded");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Market data not readable yet"),
            }

            let tracks: Vec<_> = seeded
                .iter()
                .map(|(key, created)| json!({"track": key.to_string(), "seeded": created}))
                .collect();
            print_json(&tracks, cli.pretty)?;
        }
        Command::Run { ticker, date } => {
            let ledger = debate::open_ledger(&config)?;
            let data = debate::open_market(&config)?;
            let runner = debate::build_runner(&config, &ticker, ledger, data)?;
            let report = runner
                .run_day(date.unwrap_or(today))
                .await
                .with_context(|| format!("Debate day failed for {}", runner.key()))?;
            print_json(&report, cli.pretty)?;
        }
        Command::Aggregate { ticker, date } => {
            let ledger = debate::open_ledger(&config)?;
            let report = debate::aggregate_day(&config, &ticker, &ledger, date.unwrap_or(today))?;
            print_json(&report, cli.pretty)?;
        }
        Command::History { ticker } => {
            let ledger = debate::open_ledger(&config)?;
            let history = ledger.history(&config.key_for(&ticker))?;
            print_json(&history, cli.pretty)?;
        }
    }

    Ok(())
}
