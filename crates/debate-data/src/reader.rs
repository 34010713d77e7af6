use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use debate_models::{DataFolder, PriceQuote};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::error::DataError;
use crate::memory::MemoryCache;
use crate::sqlite::MarketRecordStore;

/// Date format of the `Date` column in historical records.
pub const HISTORICAL_DATE_FORMAT: &str = "%d-%m-%Y";

/// Read-through access to market records: moka (hot) → SQLite → `Missing`.
///
/// SQLite access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct DataReader {
    memory: MemoryCache,
    sqlite: Mutex<MarketRecordStore>,
}

impl DataReader {
    pub fn new(sqlite: MarketRecordStore, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            sqlite: Mutex::new(sqlite),
        }
    }

    /// Records of one folder. An empty folder is an error, never an empty answer.
    pub async fn records(
        &self,
        ticker: &str,
        folder: DataFolder,
    ) -> Result<Arc<Vec<Value>>, DataError> {
        if let Some(records) = self.memory.get(ticker, folder).await {
            return Ok(records);
        }

        let records = {
            let sqlite = self
                .sqlite
                .lock()
                .map_err(|e| DataError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
            sqlite.records(ticker, folder)?
        };

        if records.is_empty() {
            return Err(DataError::Missing {
                ticker: ticker.to_string(),
                folder: folder.label().to_string(),
            });
        }

        debug!(ticker, folder = %folder, count = records.len(), "Loaded records from SQLite");
        let records = Arc::new(records);
        self.memory.insert(ticker, folder, Arc::clone(&records)).await;
        Ok(records)
    }

    /// JSON object keyed by folder label, one entry per requested folder.
    pub async fn snapshot(&self, ticker: &str, folders: &[DataFolder]) -> Result<Value, DataError> {
        let mut map = serde_json::Map::new();
        for &folder in folders {
            let records = self.records(ticker, folder).await?;
            map.insert(folder.label().to_string(), Value::Array(records.as_ref().clone()));
        }
        Ok(Value::Object(map))
    }

    /// Opening price of the newest historical record.
    pub async fn latest_open(&self, ticker: &str) -> Result<PriceQuote, DataError> {
        let opens = self.dated_opens(ticker).await?;
        let (date, open) = opens.last().copied().ok_or_else(|| DataError::Missing {
            ticker: ticker.to_string(),
            folder: DataFolder::Historical.label().to_string(),
        })?;

        Ok(PriceQuote {
            ticker: ticker.to_string(),
            open,
            date,
        })
    }

    /// The last `points` opening prices, oldest first.
    pub async fn open_series(&self, ticker: &str, points: usize) -> Result<Vec<Decimal>, DataError> {
        let opens = self.dated_opens(ticker).await?;
        let skip = opens.len().saturating_sub(points);
        Ok(opens.into_iter().skip(skip).map(|(_, open)| open).collect())
    }

    /// Folders with data loaded for the ticker.
    pub fn available_folders(&self, ticker: &str) -> Result<Vec<DataFolder>, DataError> {
        let sqlite = self
            .sqlite
            .lock()
            .map_err(|e| DataError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
        sqlite.folders(ticker)
    }

    /// Drop cached records for a ticker so the next read goes to SQLite.
    pub async fn reload(&self, ticker: &str) {
        self.memory.invalidate_ticker(ticker).await;
    }

    pub fn hot_cache_size(&self) -> u64 {
        self.memory.entry_count()
    }

    async fn dated_opens(&self, ticker: &str) -> Result<Vec<(NaiveDate, Decimal)>, DataError> {
        let records = self.records(ticker, DataFolder::Historical).await?;
        let mut opens = records
            .iter()
            .map(|record| parse_historical(ticker, record))
            .collect::<Result<Vec<_>, _>>()?;
        opens.sort_by_key(|(date, _)| *date);
        Ok(opens)
    }
}

fn parse_historical(ticker: &str, record: &Value) -> Result<(NaiveDate, Decimal), DataError> {
    let malformed = |reason: String| DataError::Malformed {
        ticker: ticker.to_string(),
        folder: DataFolder::Historical.label().to_string(),
        reason,
    };

    let date_text = record
        .get("Date")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing Date".to_string()))?;
    let date = NaiveDate::parse_from_str(date_text, HISTORICAL_DATE_FORMAT)
        .map_err(|e| malformed(format!("Date '{date_text}': {e}")))?;

    let open_text = match record.get("Open") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => return Err(malformed(format!("missing Open on {date_text}"))),
    };
    let open = Decimal::from_str(&open_text)
        .or_else(|_| Decimal::from_scientific(&open_text))
        .map_err(|e| malformed(format!("Open '{open_text}': {e}")))?
        .normalize();

    Ok((date, open))
}
