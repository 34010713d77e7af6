use std::fmt;

use serde::{Deserialize, Serialize};

/// The data folders an analyst can be given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DataFolder {
    Historical,
    Earnings,
    Esg,
    Financials,
    Trend,
    KeyStatistics,
    News,
}

impl DataFolder {
    pub const ALL: [DataFolder; 7] = [
        DataFolder::Historical,
        DataFolder::Earnings,
        DataFolder::Esg,
        DataFolder::Financials,
        DataFolder::Trend,
        DataFolder::KeyStatistics,
        DataFolder::News,
    ];

    /// Folder label, also used as the key in data snapshots.
    pub fn label(self) -> &'static str {
        match self {
            DataFolder::Historical => "HistoricalData",
            DataFolder::Earnings => "EarningsData",
            DataFolder::Esg => "ESGScores",
            DataFolder::Financials => "Financial Analytics Metrics",
            DataFolder::Trend => "Trend Indicator Scores",
            DataFolder::KeyStatistics => "Key Statistics",
            DataFolder::News => "News",
        }
    }

    /// File name the ingestion side writes for a ticker, e.g. `TSLA_Historical.csv`.
    pub fn file_name(self, ticker: &str) -> String {
        let stem = match self {
            DataFolder::Historical => "Historical",
            DataFolder::Earnings => "Earnings",
            DataFolder::Esg => "ESGscore",
            DataFolder::Financials => "Financials",
            DataFolder::Trend => "TrendScores",
            DataFolder::KeyStatistics => "KeyStatistics",
            DataFolder::News => "News",
        };
        format!("{ticker}_{stem}.csv")
    }

    pub fn from_label(label: &str) -> Option<Self> {
        DataFolder::ALL.into_iter().find(|f| f.label() == label)
    }
}

impl fmt::Display for DataFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
