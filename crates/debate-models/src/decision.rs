use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decision label as stored in the DailyState and ProposerOpinion tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Decision {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "BUY MORE")]
    BuyMore,
    #[serde(rename = "NON-ACTION")]
    NonAction,
    /// Placeholder carried by the genesis row of a debate track.
    #[serde(rename = "-")]
    Unset,
}

/// The canonical three-way voting set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognised decision label: {0:?}")]
pub struct DecisionParseError(pub String);

impl Decision {
    pub const ALL: [Decision; 6] = [
        Decision::Buy,
        Decision::Sell,
        Decision::Hold,
        Decision::BuyMore,
        Decision::NonAction,
        Decision::Unset,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Sell => "SELL",
            Decision::Hold => "HOLD",
            Decision::BuyMore => "BUY MORE",
            Decision::NonAction => "NON-ACTION",
            Decision::Unset => "-",
        }
    }

    /// Fold a stored label into the voting set.
    ///
    /// `BUY MORE` counts as a buy and `NON-ACTION` as a hold. The genesis
    /// placeholder has no vote.
    pub fn vote(self) -> Option<Vote> {
        match self {
            Decision::Buy | Decision::BuyMore => Some(Vote::Buy),
            Decision::Sell => Some(Vote::Sell),
            Decision::Hold | Decision::NonAction => Some(Vote::Hold),
            Decision::Unset => None,
        }
    }
}

impl Vote {
    pub const ALL: [Vote; 3] = [Vote::Buy, Vote::Sell, Vote::Hold];

    pub fn decision(self) -> Decision {
        match self {
            Vote::Buy => Decision::Buy,
            Vote::Sell => Decision::Sell,
            Vote::Hold => Decision::Hold,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.decision().label())
    }
}

impl FromStr for Decision {
    type Err = DecisionParseError;

    /// Case-insensitive, tolerant of surrounding whitespace and of `_` or
    /// repeated spaces inside `BUY MORE`. Nothing else is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_ascii_uppercase()
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        Decision::ALL
            .into_iter()
            .find(|d| d.label() == normalized)
            .ok_or_else(|| DecisionParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_roundtrip_through_from_str() {
        for decision in Decision::ALL {
            assert_eq!(decision.label().parse::<Decision>().unwrap(), decision);
        }
    }

    #[test]
    fn parse_is_case_and_space_tolerant() {
        assert_eq!(" hold ".parse::<Decision>().unwrap(), Decision::Hold);
        assert_eq!("Buy  More".parse::<Decision>().unwrap(), Decision::BuyMore);
        assert_eq!("buy_more".parse::<Decision>().unwrap(), Decision::BuyMore);
        assert_eq!("non-action".parse::<Decision>().unwrap(), Decision::NonAction);
    }

    #[test]
    fn parse_rejects_unknown_labels() {
        assert!("STRONG BUY".parse::<Decision>().is_err());
        assert!("".parse::<Decision>().is_err());
        assert!("BUYMORE".parse::<Decision>().is_err());
    }

    #[test]
    fn extended_labels_fold_into_votes() {
        assert_eq!(Decision::BuyMore.vote(), Some(Vote::Buy));
        assert_eq!(Decision::NonAction.vote(), Some(Vote::Hold));
        assert_eq!(Decision::Unset.vote(), None);
    }

    #[test]
    fn serde_uses_stored_labels() {
        assert_eq!(
            serde_json::to_string(&Decision::BuyMore).unwrap(),
            "\"BUY MORE\""
        );
        assert_eq!(serde_json::to_string(&Decision::Unset).unwrap(), "\"-\"");
        assert_eq!(serde_json::to_string(&Vote::Hold).unwrap(), "\"HOLD\"");
    }
}
