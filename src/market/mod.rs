//! Market-data sources.
//!
//! Defines the `CandleSource` trait the scan engine fetches through,
//! and an HTTP implementation for the candle endpoint.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Candle;

/// Abstraction over a candle-history endpoint.
///
/// Implementors return the most recent `count` candles for a pair,
/// oldest first. Any failure (network, status, payload) is an `Err`;
/// the engine treats all of them alike.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch recent candle history for one pair.
    async fn fetch_candles(&self, pair: &str, count: usize) -> Result<Vec<Candle>>;
}
