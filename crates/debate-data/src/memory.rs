use std::sync::Arc;
use std::time::Duration;

use debate_models::DataFolder;
use moka::future::Cache;
use serde_json::Value;

/// Hot cache of parsed folder records, keyed by (ticker, folder).
///
/// Every analyst in a day reads the same few folders, so after the first
/// read the rest hit memory. Entries expire after the TTL so a reload by
/// the ingestion side becomes visible.
pub struct MemoryCache {
    inner: Cache<(String, DataFolder), Arc<Vec<Value>>>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, ticker: &str, folder: DataFolder) -> Option<Arc<Vec<Value>>> {
        self.inner.get(&(ticker.to_string(), folder)).await
    }

    pub async fn insert(&self, ticker: &str, folder: DataFolder, records: Arc<Vec<Value>>) {
        self.inner.insert((ticker.to_string(), folder), records).await;
    }

    pub async fn invalidate_ticker(&self, ticker: &str) {
        for folder in DataFolder::ALL {
            self.inner.invalidate(&(ticker.to_string(), folder)).await;
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
