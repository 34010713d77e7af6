use chrono::Utc;
use debate_models::schema::MARKET_RECORDS_DDL;
use debate_models::DataFolder;
use rusqlite::{params, Connection, OpenFlags};
use serde_json::Value;

use crate::error::DataError;

/// SQLite access to the per-folder market records.
///
/// The records are written by the ingestion side, one row per flat CSV
/// record. The debate only reads them, so production opens are read-only.
pub struct MarketRecordStore {
    conn: Connection,
}

impl MarketRecordStore {
    /// Open a read-only connection to an existing market database.
    pub fn open(path: &str) -> Result<Self, DataError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open read-write, creating the table if needed. WAL lets readers run
    /// while the ingestion side writes.
    pub fn open_writable(path: &str) -> Result<Self, DataError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(MARKET_RECORDS_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Writable in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, DataError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MARKET_RECORDS_DDL)?;
        Ok(Self { conn })
    }

    /// Replace every record of one folder for a ticker. Returns the number written.
    pub fn insert_records(
        &mut self,
        ticker: &str,
        folder: DataFolder,
        records: &[Value],
    ) -> Result<usize, DataError> {
        let loaded_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM market_records WHERE ticker = ?1 AND folder = ?2",
            params![ticker, folder.label()],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO market_records (ticker, folder, seq, record_json, loaded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (seq, record) in records.iter().enumerate() {
                stmt.execute(params![
                    ticker,
                    folder.label(),
                    seq as i64,
                    serde_json::to_string(record)?,
                    loaded_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Records of one folder in ingestion order. Empty if none were loaded.
    pub fn records(&self, ticker: &str, folder: DataFolder) -> Result<Vec<Value>, DataError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT record_json FROM market_records \
             WHERE ticker = ?1 AND folder = ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![ticker, folder.label()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(DataError::from))
            .collect()
    }

    /// Folders that hold at least one record for the ticker.
    pub fn folders(&self, ticker: &str) -> Result<Vec<DataFolder>, DataError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT folder FROM market_records WHERE ticker = ?1")?;
        let labels = stmt
            .query_map(params![ticker], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut folders: Vec<DataFolder> = labels
            .iter()
            .filter_map(|label| DataFolder::from_label(label))
            .collect();
        folders.sort();
        Ok(folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_keep_ingestion_order() {
        let mut store = MarketRecordStore::open_in_memory().unwrap();
        let written = store
            .insert_records(
                "TSLA",
                DataFolder::News,
                &[json!({"headline": "first"}), json!({"headline": "second"})],
            )
            .unwrap();
        assert_eq!(written, 2);

        let records = store.records("TSLA", DataFolder::News).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["headline"], "first");
        assert_eq!(records[1]["headline"], "second");
    }

    #[test]
    fn reload_replaces_folder() {
        let mut store = MarketRecordStore::open_in_memory().unwrap();
        store
            .insert_records("TSLA", DataFolder::Esg, &[json!({"a": 1}), json!({"a": 2})])
            .unwrap();
        store
            .insert_records("TSLA", DataFolder::Esg, &[json!({"a": 3})])
            .unwrap();

        let records = store.records("TSLA", DataFolder::Esg).unwrap();
        assert_eq!(records, vec![json!({"a": 3})]);
    }

    #[test]
    fn missing_folder_is_empty() {
        let store = MarketRecordStore::open_in_memory().unwrap();
        assert!(store.records("TSLA", DataFolder::Earnings).unwrap().is_empty());
    }

    #[test]
    fn folders_lists_loaded_only() {
        let mut store = MarketRecordStore::open_in_memory().unwrap();
        store
            .insert_records("MSFT", DataFolder::News, &[json!({})])
            .unwrap();
        store
            .insert_records("MSFT", DataFolder::Historical, &[json!({})])
            .unwrap();
        store
            .insert_records("TSLA", DataFolder::Trend, &[json!({})])
            .unwrap();

        assert_eq!(
            store.folders("MSFT").unwrap(),
            vec![DataFolder::Historical, DataFolder::News]
        );
    }
}
