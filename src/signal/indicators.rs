//! The three voting indicators.
//!
//! Each indicator looks at the evaluation window (oldest → newest) and
//! casts at most one vote. None of them allocate or fail.

use crate::types::{Candle, CandleColor, Direction};

/// Candles of one colour needed in the window for the majority vote.
pub const MAJORITY_THRESHOLD: usize = 10;

/// Length of the trailing same-colour run for the momentum vote.
pub const STREAK_LEN: usize = 3;

/// Majority colour: a direction votes when its colour fills at least
/// [`MAJORITY_THRESHOLD`] candles of the window.
pub fn majority_vote(window: &[Candle]) -> Option<Direction> {
    let ups = window.iter().filter(|c| c.color == CandleColor::Up).count();
    let downs = window.iter().filter(|c| c.color == CandleColor::Down).count();

    if ups >= MAJORITY_THRESHOLD {
        Some(Direction::Call)
    } else if downs >= MAJORITY_THRESHOLD {
        Some(Direction::Put)
    } else {
        None
    }
}

/// Momentum streak: the last [`STREAK_LEN`] candles share a colour.
pub fn streak_vote(window: &[Candle]) -> Option<Direction> {
    if window.len() < STREAK_LEN {
        return None;
    }
    let tail = &window[window.len() - STREAK_LEN..];
    let color = tail[0].color;
    if tail.iter().all(|c| c.color == color) {
        color.direction()
    } else {
        None
    }
}

/// Body expansion: the latest body is strictly larger than the one before it.
pub fn body_vote(window: &[Candle]) -> Option<Direction> {
    let [.., previous, latest] = window else {
        return None;
    };
    if latest.body() > previous.body() {
        latest.color.direction()
    } else {
        None
    }
}
