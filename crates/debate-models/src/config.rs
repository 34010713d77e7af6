use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::folder::DataFolder;
use crate::state::DebateKey;

/// Top-level configuration, loaded from `config/debate.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub debate: DebateSettings,
    /// Ticker → company name, used in prompts and news lookups.
    #[serde(default = "default_tickers")]
    pub tickers: BTreeMap<String, String>,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            data: DataConfig::default(),
            debate: DebateSettings::default(),
            tickers: default_tickers(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{enabled} personas enabled but {expected} opinions expected per day")]
    PersonaCountMismatch { expected: usize, enabled: usize },

    #[error("persona {0} is configured more than once")]
    DuplicatePersona(String),

    #[error("persona {0} has no data to work from")]
    EmptyPersona(String),
}

/// The append-only decision store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub sqlite_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/debate.db".to_string(),
        }
    }
}

/// The market record store the analysts read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    /// Path to the SQLite file written by the ingestion side.
    pub sqlite_path: String,
    /// Maximum number of folders kept in the in-memory moka cache.
    #[serde(default = "default_memory_capacity")]
    pub memory_max_capacity: u64,
    #[serde(default = "default_memory_ttl")]
    pub memory_ttl_seconds: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/market.db".to_string(),
            memory_max_capacity: default_memory_capacity(),
            memory_ttl_seconds: default_memory_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Each analyst runs to completion before the next starts.
    #[default]
    Sequential,
    /// Analysts run concurrently; aggregation waits for all of them or the total timeout.
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateSettings {
    /// Label of the model family, part of the debate key (e.g. "GPT3.5").
    #[serde(default = "default_model_label")]
    pub model: String,
    /// Version of the debate structure, part of the debate key.
    #[serde(default = "default_version")]
    pub version: String,
    /// Number of opinions that must be present before aggregating.
    #[serde(default = "default_expected_opinions")]
    pub expected_opinions: usize,
    #[serde(default)]
    pub run_mode: RunMode,
    #[serde(default = "default_total_timeout")]
    pub total_timeout_seconds: u64,
    #[serde(default = "default_analyst_timeout")]
    pub analyst_timeout_seconds: u64,
    /// Model passed to the LLM CLI. Personas may override it.
    #[serde(default = "default_analyst_model")]
    pub analyst_model: String,
    #[serde(default = "default_cli_command")]
    pub cli_command: String,
    /// Number of opening prices handed to time-series personas.
    #[serde(default = "default_timeseries_points")]
    pub timeseries_points: usize,
    /// Directory for per-run transcripts. None disables them.
    #[serde(default)]
    pub transcript_dir: Option<String>,
    #[serde(default = "default_personas")]
    pub personas: Vec<PersonaConfig>,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            model: default_model_label(),
            version: default_version(),
            expected_opinions: default_expected_opinions(),
            run_mode: RunMode::default(),
            total_timeout_seconds: default_total_timeout(),
            analyst_timeout_seconds: default_analyst_timeout(),
            analyst_model: default_analyst_model(),
            cli_command: default_cli_command(),
            timeseries_points: default_timeseries_points(),
            transcript_dir: None,
            personas: default_personas(),
        }
    }
}

/// A versioned analyst persona. The instructions are persona-specific; the
/// decision rules every analyst must follow are appended by the prompt
/// renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaConfig {
    pub name: String,
    #[serde(default = "default_template_version")]
    pub template_version: u32,
    #[serde(default)]
    pub folders: Vec<DataFolder>,
    /// Hand the persona the recent opening-price series.
    #[serde(default)]
    pub include_timeseries: bool,
    pub instructions: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Override for `DebateSettings::analyst_model`.
    pub model: Option<String>,
}

impl DebateConfig {
    pub fn key_for(&self, ticker: &str) -> DebateKey {
        DebateKey::new(
            ticker.to_ascii_uppercase(),
            &self.debate.model,
            &self.debate.version,
        )
    }

    pub fn company(&self, ticker: &str) -> String {
        self.tickers
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(ticker))
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn enabled_personas(&self) -> impl Iterator<Item = &PersonaConfig> {
        self.debate.personas.iter().filter(|p| p.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = std::collections::HashSet::new();
        for persona in &self.debate.personas {
            if !names.insert(persona.name.as_str()) {
                return Err(ConfigError::DuplicatePersona(persona.name.clone()));
            }
            if persona.folders.is_empty() && !persona.include_timeseries {
                return Err(ConfigError::EmptyPersona(persona.name.clone()));
            }
        }

        let enabled = self.enabled_personas().count();
        if enabled != self.debate.expected_opinions {
            return Err(ConfigError::PersonaCountMismatch {
                expected: self.debate.expected_opinions,
                enabled,
            });
        }
        Ok(())
    }
}

fn persona(name: &str, folders: &[DataFolder], include_timeseries: bool, instructions: &str) -> PersonaConfig {
    PersonaConfig {
        name: name.to_string(),
        template_version: default_template_version(),
        folders: folders.to_vec(),
        include_timeseries,
        instructions: instructions.to_string(),
        enabled: true,
        model: None,
    }
}

/// The six analysts of the daily debate.
pub fn default_personas() -> Vec<PersonaConfig> {
    use DataFolder::*;
    vec![
        persona(
            "MDfinAnalyst",
            &[Historical, Financials],
            false,
            "You are MDfinAnalyst, a skilled financial analyst. Report on the price fluctuations \
             and financial indicators of the company. Judge whether it is a robust company and \
             whether the price is likely to rise or fall in the near future.",
        ),
        persona(
            "MDnewsAnalyst",
            &[News, Trend, Esg],
            false,
            "You are MDnewsAnalyst, a financial news analyst. Reflect on the sentiment of the \
             recent news, trend estimates and ESG scores, and judge whether the media outlook \
             suggests the price will rise or fall in the short term.",
        ),
        persona(
            "MDnrelAnalyst",
            &[News, Historical],
            false,
            "You are MDnrelAnalyst, an analyst of how news relates to price. Compare the recent \
             articles with the prices on the days they appeared and judge whether today's news \
             will move the price up or down.",
        ),
        persona(
            "MDtserAnalyst",
            &[],
            true,
            "You are MDtserAnalyst, a time-series predictor. Continue the given sequence of \
             opening prices with the next 10 predicted values and base your decision on that \
             prediction. Include the predicted values in your content.",
        ),
        persona(
            "MDearnAnalyst",
            &[Earnings, Trend],
            false,
            "You are MDearnAnalyst, an earnings analyst. Judge whether earnings have gone up or \
             down in recent quarters and years, and whether the trend estimates put the company \
             in a good place financially.",
        ),
        persona(
            "MDkeyAnalyst",
            &[KeyStatistics, Financials],
            false,
            "You are MDkeyAnalyst, a key-statistics analyst. Look at twoHundredDayAverage, \
             fiftyDayAverage and priceToBook, and at totalDebt, totalCash, totalRevenue, \
             revenuePerShare, operatingCashflow and earningsGrowth.",
        ),
    ]
}

fn default_tickers() -> BTreeMap<String, String> {
    [
        ("TSLA", "Tesla"),
        ("MSFT", "Microsoft"),
        ("NVDA", "Nvidia"),
        ("META", "Meta"),
    ]
    .into_iter()
    .map(|(t, c)| (t.to_string(), c.to_string()))
    .collect()
}

fn default_memory_capacity() -> u64 {
    1_000
}
fn default_memory_ttl() -> u64 {
    300
}
fn default_model_label() -> String {
    "GPT3.5".to_string()
}
fn default_version() -> String {
    "V2".to_string()
}
fn default_expected_opinions() -> usize {
    6
}
fn default_total_timeout() -> u64 {
    900
}
fn default_analyst_timeout() -> u64 {
    180
}
fn default_analyst_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}
fn default_cli_command() -> String {
    "claude".to_string()
}
fn default_timeseries_points() -> usize {
    10
}
fn default_template_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
