/// Tables shared by the debate store.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS daily_state (
///     id            INTEGER PRIMARY KEY AUTOINCREMENT,
///     date          TEXT NOT NULL,
///     ticker        TEXT NOT NULL,
///     model         TEXT NOT NULL,
///     version       TEXT NOT NULL,
///     content       TEXT NOT NULL,
///     decision      TEXT NOT NULL,
///     price         TEXT NOT NULL,
///     position      INTEGER NOT NULL,
///     positionsize  TEXT NOT NULL,
///     UNIQUE (date, ticker, model, version)
/// );
/// ```
///
/// `proposer_opinion.key` references the `daily_state` row the opinion
/// reacts to. Both tables are append-only; the UNIQUE constraints turn a
/// second write for the same day into an error instead of a duplicate row.
pub const DEBATE_TABLES_DDL: &str = "\
CREATE TABLE IF NOT EXISTS daily_state (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    date          TEXT NOT NULL,
    ticker        TEXT NOT NULL,
    model         TEXT NOT NULL,
    version       TEXT NOT NULL,
    content       TEXT NOT NULL,
    decision      TEXT NOT NULL,
    price         TEXT NOT NULL,
    position      INTEGER NOT NULL,
    positionsize  TEXT NOT NULL,
    UNIQUE (date, ticker, model, version)
);
CREATE INDEX IF NOT EXISTS idx_daily_state_track ON daily_state(ticker, model, version, date);

CREATE TABLE IF NOT EXISTS proposer_opinion (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    key           INTEGER NOT NULL REFERENCES daily_state(id),
    date          TEXT NOT NULL,
    ticker        TEXT NOT NULL,
    agent         TEXT NOT NULL,
    model         TEXT NOT NULL,
    version       TEXT NOT NULL,
    content       TEXT NOT NULL,
    decision      TEXT NOT NULL,
    price         TEXT NOT NULL,
    position      INTEGER NOT NULL,
    positionsize  TEXT NOT NULL,
    UNIQUE (date, ticker, model, version, agent)
);
CREATE INDEX IF NOT EXISTS idx_opinion_day ON proposer_opinion(date, ticker, model, version);
";

/// Per-folder market records written by the ingestion side and read by
/// the analysts. One row per flat record, ordered by `seq` within a folder.
pub const MARKET_RECORDS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS market_records (
    ticker       TEXT NOT NULL,
    folder       TEXT NOT NULL,
    seq          INTEGER NOT NULL,
    record_json  TEXT NOT NULL,
    loaded_at    TEXT NOT NULL,
    PRIMARY KEY (ticker, folder, seq)
);
CREATE INDEX IF NOT EXISTS idx_market_ticker ON market_records(ticker);
";

/// Date format used by every date column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
