//! Per-pair signal evaluation.
//!
//! Turns the most recent candles of one pair into an optional
//! directional call. Three independent indicators vote (see
//! [`indicators`]); a direction needs at least two concurring votes.
//! Pure: no I/O, no state, never fails.

pub mod indicators;

use rust_decimal::Decimal;
use tracing::trace;

use crate::types::{format_price, Candle, Direction, SignalResult};
use indicators::{body_vote, majority_vote, streak_vote};

/// Candles considered by every indicator.
pub const WINDOW: usize = 15;

/// Votes a direction needs before it is declared.
pub const MIN_VOTES: u8 = 2;

/// Raw evaluator output for one pair, before it is tagged with a pair
/// name and prediction time.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub direction: Direction,
    /// Concurring votes (2 or 3).
    pub strength: u8,
    pub last_close: Decimal,
    /// Lowest close in the window.
    pub support: Decimal,
    /// Highest close in the window.
    pub resistance: Decimal,
}

impl Evaluation {
    /// Attach pair and prediction time, formatting prices for display.
    pub fn into_signal(self, pair: &str, predicted_time: &str) -> SignalResult {
        SignalResult {
            pair: pair.to_string(),
            direction: self.direction,
            strength: self.strength,
            predicted_time: predicted_time.to_string(),
            last_close: format_price(self.last_close),
            support: format_price(self.support),
            resistance: format_price(self.resistance),
        }
    }
}

/// Evaluate a pair's candle history (oldest → newest).
///
/// Returns `None` with fewer than [`WINDOW`] candles, when no direction
/// collects [`MIN_VOTES`], or when both directions do.
pub fn evaluate(candles: &[Candle]) -> Option<Evaluation> {
    if candles.len() < WINDOW {
        return None;
    }
    let window = &candles[candles.len() - WINDOW..];

    let votes = [majority_vote(window), streak_vote(window), body_vote(window)];
    let calls = votes.iter().filter(|v| **v == Some(Direction::Call)).count() as u8;
    let puts = votes.iter().filter(|v| **v == Some(Direction::Put)).count() as u8;

    let (direction, strength) = match (calls >= MIN_VOTES, puts >= MIN_VOTES) {
        (true, false) => (Direction::Call, calls),
        (false, true) => (Direction::Put, puts),
        // Unreachable with three single-vote indicators; kept for new ones.
        (true, true) => {
            trace!(calls, puts, "Tied vote, no signal");
            return None;
        }
        (false, false) => return None,
    };

    let last = window.last()?;
    let support = window.iter().map(|c| c.close).min()?;
    let resistance = window.iter().map(|c| c.close).max()?;

    Some(Evaluation {
        direction,
        strength,
        last_close: last.close,
        support,
        resistance,
    })
}
