use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("daily state already recorded for {key} on {date}")]
    AlreadyRecorded { key: String, date: NaiveDate },

    #[error("opinion from {agent} already recorded for {key} on {date}")]
    DuplicateOpinion {
        agent: String,
        key: String,
        date: NaiveDate,
    },

    #[error("refusing to write inconsistent row: {0}")]
    Inconsistent(String),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("store not available: {0}")]
    Unavailable(String),
}
