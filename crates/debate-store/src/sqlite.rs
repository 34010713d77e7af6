use std::str::FromStr;

use chrono::NaiveDate;
use debate_models::schema::DEBATE_TABLES_DDL;
use debate_models::{DailyState, DebateKey, Decision, ProposerOpinion};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::StoreError;

const STATE_COLUMNS: &str =
    "id, date, ticker, model, version, content, decision, price, position, positionsize";

const OPINION_COLUMNS: &str =
    "key, date, ticker, agent, model, version, content, decision, price, position, positionsize";

/// Persistence for the two append-only debate tables.
///
/// Rows are inserted and read, never updated. The UNIQUE constraints of the
/// schema are what make a second write for the same day fail.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (or create) a file database. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// In-memory database with the schema applied, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(DEBATE_TABLES_DDL)?;
        Ok(Self { conn })
    }

    /// The most recent DailyState for a key, by date.
    pub fn latest_state(&self, key: &DebateKey) -> Result<Option<DailyState>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {STATE_COLUMNS} FROM daily_state \
             WHERE ticker = ?1 AND model = ?2 AND version = ?3 \
             ORDER BY date DESC, id DESC LIMIT 1"
        ))?;
        let raw = stmt
            .query_row(params![key.ticker, key.model, key.version], RawState::from_row)
            .optional()?;
        raw.map(RawState::into_state).transpose()
    }

    /// Full history of a key, oldest first.
    pub fn history(&self, key: &DebateKey) -> Result<Vec<DailyState>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {STATE_COLUMNS} FROM daily_state \
             WHERE ticker = ?1 AND model = ?2 AND version = ?3 \
             ORDER BY date ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![key.ticker, key.model, key.version], RawState::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawState::into_state).collect()
    }

    /// Insert a new DailyState and return its row id.
    pub fn insert_daily_state(&self, state: &DailyState) -> Result<i64, StoreError> {
        let id = write_state(&self.conn, state)?;
        debug!(id, key = %state.key(), date = %state.date, "Inserted daily state");
        Ok(id)
    }

    /// Insert the genesis row for a key that has no history yet.
    /// Returns false (and writes nothing) if the key already has rows.
    pub fn seed_genesis(&mut self, key: &DebateKey, date: NaiveDate) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM daily_state WHERE ticker = ?1 AND model = ?2 AND version = ?3",
            params![key.ticker, key.model, key.version],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(false);
        }

        write_state(&tx, &DailyState::genesis(key, date))?;
        tx.commit()?;
        info!(key = %key, date = %date, "Seeded genesis state");
        Ok(true)
    }

    /// Insert one analyst's opinion and return its row id.
    pub fn insert_opinion(&self, opinion: &ProposerOpinion) -> Result<i64, StoreError> {
        let result = self.conn.execute(
            "INSERT INTO proposer_opinion \
             (key, date, ticker, agent, model, version, content, decision, price, position, positionsize) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                opinion.key,
                opinion.date,
                opinion.ticker,
                opinion.agent,
                opinion.model,
                opinion.version,
                opinion.content,
                opinion.decision.label(),
                opinion.price,
                opinion.position,
                opinion.positionsize.to_string(),
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateOpinion {
                agent: opinion.agent.clone(),
                key: format!("{}_{}_{}", opinion.ticker, opinion.model, opinion.version),
                date: opinion.date,
            }),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// All opinions written for a key on a date, in insertion order.
    pub fn opinions_for(
        &self,
        date: NaiveDate,
        key: &DebateKey,
    ) -> Result<Vec<ProposerOpinion>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {OPINION_COLUMNS} FROM proposer_opinion \
             WHERE date = ?1 AND ticker = ?2 AND model = ?3 AND version = ?4 \
             ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(
                params![date, key.ticker, key.model, key.version],
                RawOpinion::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawOpinion::into_opinion).collect()
    }
}

/// Shared `daily_state` INSERT. Takes a plain connection or an open transaction.
fn write_state(conn: &Connection, state: &DailyState) -> Result<i64, StoreError> {
    if !state.is_consistent() {
        return Err(StoreError::Inconsistent(format!(
            "position={} with positionsize={} on {}",
            state.position, state.positionsize, state.date
        )));
    }

    let result = conn.execute(
        "INSERT INTO daily_state \
         (date, ticker, model, version, content, decision, price, position, positionsize) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            state.date,
            state.ticker,
            state.model,
            state.version,
            state.content,
            state.decision.label(),
            state.price,
            state.position,
            state.positionsize.to_string(),
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyRecorded {
            key: state.key().to_string(),
            date: state.date,
        }),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_decision(label: &str) -> Result<Decision, StoreError> {
    Decision::from_str(label).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_size(text: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(text)
        .map_err(|e| StoreError::Corrupt(format!("positionsize '{text}': {e}")))
}

/// Column values as stored, before the text columns are parsed.
struct RawState {
    id: i64,
    date: NaiveDate,
    ticker: String,
    model: String,
    version: String,
    content: String,
    decision: String,
    price: String,
    position: bool,
    positionsize: String,
}

impl RawState {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            ticker: row.get(2)?,
            model: row.get(3)?,
            version: row.get(4)?,
            content: row.get(5)?,
            decision: row.get(6)?,
            price: row.get(7)?,
            position: row.get(8)?,
            positionsize: row.get(9)?,
        })
    }

    fn into_state(self) -> Result<DailyState, StoreError> {
        Ok(DailyState {
            id: Some(self.id),
            date: self.date,
            decision: parse_decision(&self.decision)?,
            positionsize: parse_size(&self.positionsize)?,
            ticker: self.ticker,
            model: self.model,
            version: self.version,
            content: self.content,
            price: self.price,
            position: self.position,
        })
    }
}

struct RawOpinion {
    key: i64,
    date: NaiveDate,
    ticker: String,
    agent: String,
    model: String,
    version: String,
    content: String,
    decision: String,
    price: String,
    position: bool,
    positionsize: String,
}

impl RawOpinion {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            date: row.get(1)?,
            ticker: row.get(2)?,
            agent: row.get(3)?,
            model: row.get(4)?,
            version: row.get(5)?,
            content: row.get(6)?,
            decision: row.get(7)?,
            price: row.get(8)?,
            position: row.get(9)?,
            positionsize: row.get(10)?,
        })
    }

    fn into_opinion(self) -> Result<ProposerOpinion, StoreError> {
        Ok(ProposerOpinion {
            key: self.key,
            date: self.date,
            decision: parse_decision(&self.decision)?,
            positionsize: parse_size(&self.positionsize)?,
            ticker: self.ticker,
            agent: self.agent,
            model: self.model,
            version: self.version,
            content: self.content,
            price: self.price,
            position: self.position,
        })
    }
}
