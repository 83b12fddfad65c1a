//! Signal scanner: batched multi-pair candle scan with voting signals.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod market;
pub mod signal;
pub mod engine;
pub mod dashboard;
