use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Decision;
use crate::state::{DailyState, DebateKey};

/// Today's opening price for a ticker, taken from the newest historical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub ticker: String,
    pub open: Decimal,
    pub date: NaiveDate,
}

/// Everything an analyst gets to decide on (serialized as JSON into the user prompt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalystRequest {
    pub request_id: Uuid,
    pub date: NaiveDate,
    pub key: DebateKey,
    pub company: String,
    pub agent: String,
    /// The latest DailyState for the key.
    pub yesterday: DailyState,
    pub price: PriceQuote,
    /// Folder label → records, for the persona's folders only.
    pub data: serde_json::Value,
    /// Recent opening prices, oldest first, for time-series personas.
    pub open_series: Option<Vec<Decimal>>,
}

/// The fixed-shape reply extracted from an analyst's free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalystReply {
    pub decision: Decision,
    /// Shares held at the end of the day after this decision.
    pub positionsize: Decimal,
    /// Reported holding flag. When absent it is derived from `positionsize`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<bool>,
    pub content: String,
}

impl AnalystReply {
    pub fn reported_position(&self) -> bool {
        self.position.unwrap_or(self.positionsize > Decimal::ZERO)
    }
}
