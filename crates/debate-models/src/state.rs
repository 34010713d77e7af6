use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

pub const GENESIS_CONTENT: &str =
    "This is the first data entry. The database is waiting for your first day investing";

/// Identifies one independent debate track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DebateKey {
    pub ticker: String,
    /// Label of the LLM family driving the analysts (e.g. "GPT3.5").
    pub model: String,
    /// Version of the debate structure (e.g. "V2").
    pub version: String,
}

impl DebateKey {
    pub fn new(ticker: impl Into<String>, model: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            model: model.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DebateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.ticker, self.model, self.version)
    }
}

/// One row of the append-only daily history. The latest row for a key is
/// the state every analyst reads as "yesterday".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyState {
    /// Row id assigned by the store. `None` until inserted.
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub ticker: String,
    pub model: String,
    pub version: String,
    pub content: String,
    pub decision: Decision,
    pub price: String,
    pub position: bool,
    pub positionsize: Decimal,
}

impl DailyState {
    /// The placeholder row a track starts from: flat, no decision yet.
    pub fn genesis(key: &DebateKey, date: NaiveDate) -> Self {
        Self {
            id: None,
            date,
            ticker: key.ticker.clone(),
            model: key.model.clone(),
            version: key.version.clone(),
            content: GENESIS_CONTENT.to_string(),
            decision: Decision::Unset,
            price: "-".to_string(),
            position: false,
            positionsize: Decimal::ZERO,
        }
    }

    pub fn key(&self) -> DebateKey {
        DebateKey::new(&self.ticker, &self.model, &self.version)
    }

    pub fn belongs_to(&self, key: &DebateKey) -> bool {
        self.ticker == key.ticker && self.model == key.model && self.version == key.version
    }

    /// `position` must be set exactly when shares are held.
    pub fn is_consistent(&self) -> bool {
        self.position == (self.positionsize > Decimal::ZERO)
    }
}

/// A single analyst's opinion for one day, written once and never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposerOpinion {
    /// Id of the DailyState row this opinion reacts to.
    pub key: i64,
    pub date: NaiveDate,
    pub ticker: String,
    pub agent: String,
    pub model: String,
    pub version: String,
    pub content: String,
    pub decision: Decision,
    pub price: String,
    pub position: bool,
    /// Shares held after applying this analyst's decision.
    pub positionsize: Decimal,
}

impl ProposerOpinion {
    pub fn belongs_to(&self, key: &DebateKey) -> bool {
        self.ticker == key.ticker && self.model == key.model && self.version == key.version
    }
}
