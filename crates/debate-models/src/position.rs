//! Position state machine.
//!
//! A debate track is either FLAT (no shares) or HOLDING a positive number of
//! shares. Every analyst decision is a transition out of yesterday's state,
//! and the table of legal transitions is enforced twice: when an analyst
//! formulates its own action ([`PositionState::apply`]) and when an
//! untrusted, already-reported opinion is consumed ([`validate_opinion`]).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decision::{Decision, Vote};
use crate::state::DailyState;

/// Largest end-of-day position any opinion may report, in shares.
pub const MAX_POSITION_SHARES: u64 = 1_000_000_000_000;

pub fn max_position_size() -> Decimal {
    Decimal::from(MAX_POSITION_SHARES)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "positionsize", rename_all = "snake_case")]
pub enum PositionState {
    Flat,
    Holding(Decimal),
}

/// A proposer-side action expressed as a share delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy(Decimal),
    Sell(Decimal),
    Hold,
}

/// A deterministic correction applied to an opinion instead of rejecting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// SELL with nothing held becomes HOLD at size 0.
    SellWhileFlat,
    /// HOLD reported a size different from yesterday's; yesterday's wins.
    HoldSizeDrift { reported: Decimal, expected: Decimal },
    /// The reported `position` flag disagreed with the size.
    PositionFlagMismatch { reported: bool },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("'{0}' is not a proposable decision")]
    NotAProposal(Decision),

    #[error("position size must be non-negative, got {0}")]
    NegativeSize(Decimal),

    #[error("share delta must be positive, got {0}")]
    NonPositiveDelta(Decimal),

    #[error("position size {0} exceeds the share limit")]
    SizeTooLarge(Decimal),

    #[error("position size arithmetic overflowed")]
    Overflow,

    #[error("BUY must increase the position: previous {previous}, reported {reported}")]
    BuyWithoutIncrease { previous: Decimal, reported: Decimal },

    #[error("SELL must decrease the position: previous {previous}, reported {reported}")]
    SellWithoutDecrease { previous: Decimal, reported: Decimal },
}

/// Outcome of applying an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub decision: Decision,
    pub state: PositionState,
    pub normalization: Option<Normalization>,
}

/// An opinion that passed the transition table, possibly after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOpinion {
    pub decision: Decision,
    pub vote: Vote,
    pub positionsize: Decimal,
    pub position: bool,
    pub normalizations: Vec<Normalization>,
}

impl PositionState {
    pub fn from_size(size: Decimal) -> Self {
        if size > Decimal::ZERO {
            PositionState::Holding(size)
        } else {
            PositionState::Flat
        }
    }

    pub fn of(state: &DailyState) -> Self {
        Self::from_size(state.positionsize)
    }

    pub fn size(self) -> Decimal {
        match self {
            PositionState::Flat => Decimal::ZERO,
            PositionState::Holding(size) => size,
        }
    }

    pub fn is_holding(self) -> bool {
        matches!(self, PositionState::Holding(_))
    }

    pub fn apply(self, action: Action) -> Result<Transition, PositionError> {
        match action {
            Action::Buy(delta) | Action::Sell(delta) if delta <= Decimal::ZERO => {
                Err(PositionError::NonPositiveDelta(delta))
            }
            Action::Buy(delta) => {
                let size = self
                    .size()
                    .checked_add(delta)
                    .ok_or(PositionError::Overflow)?;
                if size > max_position_size() {
                    return Err(PositionError::SizeTooLarge(size));
                }
                Ok(Transition {
                    decision: Decision::Buy,
                    state: PositionState::Holding(size),
                    normalization: None,
                })
            }
            Action::Sell(_) if !self.is_holding() => Ok(Transition {
                decision: Decision::Hold,
                state: PositionState::Flat,
                normalization: Some(Normalization::SellWhileFlat),
            }),
            Action::Sell(delta) => Ok(Transition {
                decision: Decision::Sell,
                state: PositionState::from_size(
                    self.size().checked_sub(delta).ok_or(PositionError::Overflow)?,
                ),
                normalization: None,
            }),
            Action::Hold => Ok(Transition {
                decision: Decision::Hold,
                state: self,
                normalization: None,
            }),
        }
    }
}

/// Check a reported end-of-day opinion against yesterday's state.
pub fn validate_opinion(
    previous: PositionState,
    decision: Decision,
    reported_size: Decimal,
    reported_position: bool,
) -> Result<ValidatedOpinion, PositionError> {
    let vote = decision
        .vote()
        .ok_or(PositionError::NotAProposal(decision))?;
    if reported_size < Decimal::ZERO {
        return Err(PositionError::NegativeSize(reported_size));
    }
    if reported_size > max_position_size() {
        return Err(PositionError::SizeTooLarge(reported_size));
    }

    let previous_size = previous.size();
    let mut normalizations = Vec::new();

    let (decision, vote, positionsize) = match (previous, vote) {
        (PositionState::Flat, Vote::Sell) => {
            normalizations.push(Normalization::SellWhileFlat);
            (Decision::Hold, Vote::Hold, Decimal::ZERO)
        }
        (_, Vote::Hold) => {
            if reported_size != previous_size {
                normalizations.push(Normalization::HoldSizeDrift {
                    reported: reported_size,
                    expected: previous_size,
                });
            }
            (decision, vote, previous_size)
        }
        (_, Vote::Buy) => {
            if reported_size <= previous_size {
                return Err(PositionError::BuyWithoutIncrease {
                    previous: previous_size,
                    reported: reported_size,
                });
            }
            (decision, vote, reported_size)
        }
        (PositionState::Holding(_), Vote::Sell) => {
            if reported_size >= previous_size {
                return Err(PositionError::SellWithoutDecrease {
                    previous: previous_size,
                    reported: reported_size,
                });
            }
            (decision, vote, reported_size)
        }
    };

    let position = positionsize > Decimal::ZERO;
    if reported_position != position {
        normalizations.push(Normalization::PositionFlagMismatch {
            reported: reported_position,
        });
    }

    Ok(ValidatedOpinion {
        decision,
        vote,
        positionsize,
        position,
        normalizations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn holding_buy_adds_delta() {
        let t = PositionState::Holding(dec!(50)).apply(Action::Buy(dec!(10))).unwrap();
        assert_eq!(t.decision, Decision::Buy);
        assert_eq!(t.state, PositionState::Holding(dec!(60)));
        assert!(t.normalization.is_none());
    }

    #[test]
    fn holding_sell_partial_and_full() {
        let partial = PositionState::Holding(dec!(50)).apply(Action::Sell(dec!(5))).unwrap();
        assert_eq!(partial.state, PositionState::Holding(dec!(45)));

        let full = PositionState::Holding(dec!(50)).apply(Action::Sell(dec!(50))).unwrap();
        assert_eq!(full.state, PositionState::Flat);

        let over = PositionState::Holding(dec!(50)).apply(Action::Sell(dec!(80))).unwrap();
        assert_eq!(over.state, PositionState::Flat);
        assert_eq!(over.state.size(), Decimal::ZERO);
    }

    #[test]
    fn hold_keeps_state() {
        let t = PositionState::Holding(dec!(7.5)).apply(Action::Hold).unwrap();
        assert_eq!(t.state, PositionState::Holding(dec!(7.5)));
        let t = PositionState::Flat.apply(Action::Hold).unwrap();
        assert_eq!(t.state, PositionState::Flat);
    }

    #[test]
    fn flat_buy_opens_position() {
        let t = PositionState::Flat.apply(Action::Buy(dec!(20))).unwrap();
        assert_eq!(t.state, PositionState::Holding(dec!(20)));
    }

    #[test]
    fn flat_sell_becomes_hold() {
        let t = PositionState::Flat.apply(Action::Sell(dec!(10))).unwrap();
        assert_eq!(t.decision, Decision::Hold);
        assert_eq!(t.state, PositionState::Flat);
        assert_eq!(t.normalization, Some(Normalization::SellWhileFlat));
    }

    #[test]
    fn zero_delta_is_rejected() {
        assert_eq!(
            PositionState::Flat.apply(Action::Buy(dec!(0))),
            Err(PositionError::NonPositiveDelta(dec!(0)))
        );
        assert_eq!(
            PositionState::Holding(dec!(3)).apply(Action::Sell(dec!(-1))),
            Err(PositionError::NonPositiveDelta(dec!(-1)))
        );
    }

    #[test]
    fn validate_flat_sell_never_holds() {
        let v = validate_opinion(PositionState::Flat, Decision::Sell, dec!(25), true).unwrap();
        assert_eq!(v.decision, Decision::Hold);
        assert_eq!(v.vote, Vote::Hold);
        assert_eq!(v.positionsize, Decimal::ZERO);
        assert!(!v.position);
        assert_eq!(
            v.normalizations,
            vec![
                Normalization::SellWhileFlat,
                Normalization::PositionFlagMismatch { reported: true }
            ]
        );
    }

    #[test]
    fn validate_hold_pins_yesterdays_size() {
        let v = validate_opinion(PositionState::Holding(dec!(50)), Decision::Hold, dec!(55), true)
            .unwrap();
        assert_eq!(v.positionsize, dec!(50));
        assert_eq!(
            v.normalizations,
            vec![Normalization::HoldSizeDrift {
                reported: dec!(55),
                expected: dec!(50)
            }]
        );

        let flat = validate_opinion(PositionState::Flat, Decision::NonAction, dec!(0), false).unwrap();
        assert_eq!(flat.vote, Vote::Hold);
        assert_eq!(flat.decision, Decision::NonAction);
        assert!(flat.normalizations.is_empty());
    }

    #[test]
    fn validate_buy_requires_increase() {
        let ok = validate_opinion(PositionState::Holding(dec!(50)), Decision::BuyMore, dec!(60), true)
            .unwrap();
        assert_eq!(ok.vote, Vote::Buy);
        assert_eq!(ok.positionsize, dec!(60));

        let err = validate_opinion(PositionState::Holding(dec!(50)), Decision::Buy, dec!(50), true);
        assert_eq!(
            err,
            Err(PositionError::BuyWithoutIncrease {
                previous: dec!(50),
                reported: dec!(50)
            })
        );

        let err = validate_opinion(PositionState::Flat, Decision::Buy, dec!(0), false);
        assert!(matches!(err, Err(PositionError::BuyWithoutIncrease { .. })));
    }

    #[test]
    fn validate_sell_requires_decrease() {
        let ok = validate_opinion(PositionState::Holding(dec!(50)), Decision::Sell, dec!(0), false)
            .unwrap();
        assert!(!ok.position);
        assert!(ok.normalizations.is_empty());

        let err = validate_opinion(PositionState::Holding(dec!(50)), Decision::Sell, dec!(70), true);
        assert!(matches!(err, Err(PositionError::SellWithoutDecrease { .. })));
    }

    #[test]
    fn validate_rejects_placeholder_and_negative() {
        assert_eq!(
            validate_opinion(PositionState::Flat, Decision::Unset, dec!(0), false),
            Err(PositionError::NotAProposal(Decision::Unset))
        );
        assert_eq!(
            validate_opinion(PositionState::Holding(dec!(5)), Decision::Sell, dec!(-1), false),
            Err(PositionError::NegativeSize(dec!(-1)))
        );
    }

    #[test]
    fn validate_derives_position_flag() {
        let v = validate_opinion(PositionState::Flat, Decision::Buy, dec!(10), false).unwrap();
        assert!(v.position);
        assert_eq!(
            v.normalizations,
            vec![Normalization::PositionFlagMismatch { reported: false }]
        );
    }

    #[test]
    fn oversized_positions_are_rejected() {
        let huge = "50000000000000000000000000000".parse::<Decimal>().unwrap();
        assert_eq!(
            validate_opinion(PositionState::Flat, Decision::Buy, huge, true),
            Err(PositionError::SizeTooLarge(huge))
        );
        assert!(validate_opinion(PositionState::Flat, Decision::Buy, max_position_size(), true).is_ok());

        assert_eq!(
            PositionState::Holding(huge).apply(Action::Buy(huge)),
            Err(PositionError::Overflow)
        );
        assert!(matches!(
            PositionState::Holding(max_position_size()).apply(Action::Buy(dec!(1))),
            Err(PositionError::SizeTooLarge(_))
        ));
    }
}
