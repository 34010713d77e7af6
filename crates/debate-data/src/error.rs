use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no {folder} records for {ticker}")]
    Missing { ticker: String, folder: String },

    #[error("malformed {folder} record for {ticker}: {reason}")]
    Malformed {
        ticker: String,
        folder: String,
        reason: String,
    },

    #[error("market data not available: {0}")]
    Unavailable(String),
}
