//! Vote aggregation.
//!
//! Reduces the day's N analyst opinions into the single DailyState that the
//! next day starts from. Ties always resolve to HOLD and the position size is
//! the unweighted mean over the analysts that voted for the winner.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decision::Vote;
use crate::position::{validate_opinion, Normalization, PositionError, PositionState};
use crate::state::{DailyState, ProposerOpinion};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregateError {
    #[error("expected {expected} opinions, received {received}")]
    InsufficientOpinions { expected: usize, received: usize },

    #[error("expected {expected} opinions, received {received}")]
    TooManyOpinions { expected: usize, received: usize },

    #[error("aggregation needs at least one voter")]
    NoVoters,

    #[error("agent {0} reported more than once")]
    DuplicateAgent(String),

    #[error("previous state has not been persisted")]
    UnrecordedPrevious,

    #[error("opinion from {agent} does not react to state {expected_key}")]
    StaleOpinion { agent: String, expected_key: i64 },

    #[error("opinions span more than one date")]
    MixedDates,

    #[error("position sizes of the winning group overflow")]
    Overflow,

    #[error("opinion from {agent} rejected: {source}")]
    Rejected {
        agent: String,
        #[source]
        source: PositionError,
    },
}

/// Vote counts over the canonical set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
}

impl Tally {
    pub fn from_votes(votes: impl IntoIterator<Item = Vote>) -> Self {
        let mut tally = Self::default();
        for vote in votes {
            tally.add(vote);
        }
        tally
    }

    pub fn add(&mut self, vote: Vote) {
        match vote {
            Vote::Buy => self.buy += 1,
            Vote::Sell => self.sell += 1,
            Vote::Hold => self.hold += 1,
        }
    }

    pub fn count(&self, vote: Vote) -> usize {
        match vote {
            Vote::Buy => self.buy,
            Vote::Sell => self.sell,
            Vote::Hold => self.hold,
        }
    }

    pub fn total(&self) -> usize {
        self.buy + self.sell + self.hold
    }

    /// Plurality winner. Returns HOLD and `tied = true` when two or more
    /// labels share the maximum count.
    pub fn winner(&self) -> (Vote, bool) {
        let max = Vote::ALL.iter().map(|v| self.count(*v)).max().unwrap_or(0);
        let leaders: Vec<Vote> = Vote::ALL
            .into_iter()
            .filter(|v| self.count(*v) == max)
            .collect();

        match leaders.as_slice() {
            [single] => (*single, false),
            _ => (Vote::Hold, true),
        }
    }
}

/// A normalization attributed to the analyst whose opinion needed it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentNormalization {
    pub agent: String,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregation {
    pub date: NaiveDate,
    pub winner: Vote,
    pub tied: bool,
    pub tally: Tally,
    pub positionsize: Decimal,
    pub position: bool,
    /// Analysts whose (normalized) vote matched the winner.
    pub agreeing: Vec<String>,
    pub normalizations: Vec<AgentNormalization>,
}

impl Aggregation {
    /// Build the row to persist for today.
    pub fn into_daily_state(self, previous: &DailyState, content: String, price: String) -> DailyState {
        DailyState {
            id: None,
            date: self.date,
            ticker: previous.ticker.clone(),
            model: previous.model.clone(),
            version: previous.version.clone(),
            content,
            decision: self.winner.decision(),
            price,
            position: self.position,
            positionsize: self.positionsize,
        }
    }
}

pub fn aggregate(
    previous: &DailyState,
    opinions: &[ProposerOpinion],
    expected: usize,
) -> Result<Aggregation, AggregateError> {
    if expected == 0 {
        return Err(AggregateError::NoVoters);
    }
    if opinions.len() < expected {
        return Err(AggregateError::InsufficientOpinions {
            expected,
            received: opinions.len(),
        });
    }
    if opinions.len() > expected {
        return Err(AggregateError::TooManyOpinions {
            expected,
            received: opinions.len(),
        });
    }

    let previous_key = previous.id.ok_or(AggregateError::UnrecordedPrevious)?;
    let track = previous.key();
    let date = opinions[0].date;

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(opinions.len());
    let mut normalizations = Vec::new();
    let prior = PositionState::of(previous);

    for opinion in opinions {
        if !seen.insert(opinion.agent.as_str()) {
            return Err(AggregateError::DuplicateAgent(opinion.agent.clone()));
        }
        if opinion.key != previous_key || !opinion.belongs_to(&track) || opinion.date <= previous.date {
            return Err(AggregateError::StaleOpinion {
                agent: opinion.agent.clone(),
                expected_key: previous_key,
            });
        }
        if opinion.date != date {
            return Err(AggregateError::MixedDates);
        }

        let checked = validate_opinion(prior, opinion.decision, opinion.positionsize, opinion.position)
            .map_err(|source| AggregateError::Rejected {
                agent: opinion.agent.clone(),
                source,
            })?;
        normalizations.extend(checked.normalizations.iter().cloned().map(|normalization| {
            AgentNormalization {
                agent: opinion.agent.clone(),
                normalization,
            }
        }));
        validated.push((opinion.agent.as_str(), checked));
    }

    let tally = Tally::from_votes(validated.iter().map(|(_, v)| v.vote));
    let (winner, tied) = tally.winner();

    let agreeing: Vec<_> = validated
        .iter()
        .filter(|(_, v)| v.vote == winner)
        .collect();

    // A tie without any HOLD voters leaves nobody to average; HOLD keeps
    // yesterday's size.
    let positionsize = if agreeing.is_empty() {
        prior.size()
    } else {
        let sum = agreeing
            .iter()
            .try_fold(Decimal::ZERO, |acc, (_, v)| acc.checked_add(v.positionsize))
            .ok_or(AggregateError::Overflow)?;
        (sum / Decimal::from(agreeing.len())).normalize()
    };

    Ok(Aggregation {
        date,
        winner,
        tied,
        tally,
        positionsize,
        position: positionsize > Decimal::ZERO,
        agreeing: agreeing.iter().map(|(agent, _)| agent.to_string()).collect(),
        normalizations,
    })
}

/// Join each analyst's content into the rationale stored on the DailyState.
pub fn compose_content(opinions: &[ProposerOpinion]) -> String {
    opinions
        .iter()
        .map(|o| format!("{}: {}", o.agent, o.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
