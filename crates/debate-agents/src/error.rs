use chrono::NaiveDate;
use debate_data::DataError;
use debate_models::{AggregateError, PositionError};
use debate_store::StoreError;
use thiserror::Error;

/// Failure of a single analyst. Logged and counted by the runner, never fatal on its own.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Analyst reply parse error: {0}")]
    Parse(String),

    #[error("Analyst timed out after {0} seconds")]
    Timeout(u64),

    #[error("Analyst disabled: {0}")]
    Disabled(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Market data error: {0}")]
    Data(#[from] DataError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Illegal position: {0}")]
    Position(#[from] PositionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a whole trading day.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("no prior state for {0}; run `debate init` first")]
    NoPriorState(String),

    #[error("{key} already has a state for {date}")]
    AlreadyRecorded { key: String, date: NaiveDate },

    #[error("Market data error: {0}")]
    Data(#[from] DataError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for RunError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyRecorded { key, date } => RunError::AlreadyRecorded { key, date },
            other => RunError::Store(other),
        }
    }
}
