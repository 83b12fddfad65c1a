//! Shared types for the signal scanner.
//!
//! These types form the data model used across all modules: candles
//! coming in from the market-data source, signals coming out of the
//! evaluator, and the scan state published by the engine.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Decimal places used for every price field in a [`SignalResult`].
pub const PRICE_DECIMALS: u32 = 5;

// ---------------------------------------------------------------------------
// Candles
// ---------------------------------------------------------------------------

/// Colour of a candle body, derived upstream from open vs close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleColor {
    Up,
    Down,
    Neutral,
}

impl CandleColor {
    /// Colour implied by an open/close pair.
    pub fn from_prices(open: Decimal, close: Decimal) -> Self {
        match close.cmp(&open) {
            std::cmp::Ordering::Greater => CandleColor::Up,
            std::cmp::Ordering::Less => CandleColor::Down,
            std::cmp::Ordering::Equal => CandleColor::Neutral,
        }
    }

    /// The direction this colour votes for, if any.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            CandleColor::Up => Some(Direction::Call),
            CandleColor::Down => Some(Direction::Put),
            CandleColor::Neutral => None,
        }
    }
}

/// Parse the colour labels used by the market-data feed.
///
/// The feed speaks in `green` / `red`; `up` / `down` are accepted too.
impl std::str::FromStr for CandleColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "green" | "up" | "bull" => Ok(CandleColor::Up),
            "red" | "down" | "bear" => Ok(CandleColor::Down),
            "neutral" | "doji" | "gray" | "grey" => Ok(CandleColor::Neutral),
            other => Err(anyhow::anyhow!("Unknown candle color: {other}")),
        }
    }
}

/// One historical price bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub close: Decimal,
    pub color: CandleColor,
}

impl Candle {
    /// Build a candle whose colour is derived from its prices.
    pub fn new(open: Decimal, close: Decimal) -> Self {
        Self {
            open,
            close,
            color: CandleColor::from_prices(open, close),
        }
    }

    /// Absolute body size, `|close - open|`.
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Predicted move direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// The opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Call => Direction::Put,
            Direction::Put => Direction::Call,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Call => write!(f, "CALL"),
            Direction::Put => write!(f, "PUT"),
        }
    }
}

/// The strongest directional call derived for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub pair: String,
    pub direction: Direction,
    /// Number of concurring indicator votes (2 or 3).
    pub strength: u8,
    /// `HH:MM` of "scan start + 1 minute", shared by every pair in a scan.
    pub predicted_time: String,
    pub last_close: String,
    pub support: String,
    pub resistance: String,
}

impl fmt::Display for SignalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (strength {}/3) @ {} | close {} | S {} | R {}",
            self.pair,
            self.direction,
            self.strength,
            self.predicted_time,
            self.last_close,
            self.support,
            self.resistance,
        )
    }
}

/// Format a price with a fixed number of decimals, rounding half away from zero.
pub fn format_price(value: Decimal) -> String {
    let rounded =
        value.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", PRICE_DECIMALS as usize, rounded)
}

// ---------------------------------------------------------------------------
// Scan state
// ---------------------------------------------------------------------------

/// Human-readable phase label of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Ready,
    Scanning,
    Processing { processed: usize, total: usize },
    Cancelling,
    Cancelled,
    Complete,
    NoSignal,
}

impl ScanStatus {
    /// Whether this status ends a scan.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Cancelled | ScanStatus::Complete | ScanStatus::NoSignal
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Ready => write!(f, "Ready"),
            ScanStatus::Scanning => write!(f, "Scanning..."),
            ScanStatus::Processing { processed, total } => {
                write!(f, "Processing {processed}/{total}")
            }
            ScanStatus::Cancelling => write!(f, "Cancelling..."),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
            ScanStatus::Complete => write!(f, "Scan Complete"),
            ScanStatus::NoSignal => write!(f, "No Signal Found"),
        }
    }
}

impl Serialize for ScanStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Progress of the current (or last) scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanState {
    pub is_scanning: bool,
    pub is_cancelled: bool,
    /// 0–100
    pub progress: u8,
    pub processed_pairs: usize,
    pub total_pairs: usize,
    /// Pairs whose fetch failed at the transport layer this scan.
    pub failed_pairs: usize,
    pub status: ScanStatus,
}

impl ScanState {
    /// Idle state before any scan has run.
    pub fn ready(total_pairs: usize) -> Self {
        Self {
            is_scanning: false,
            is_cancelled: false,
            progress: 0,
            processed_pairs: 0,
            total_pairs,
            failed_pairs: 0,
            status: ScanStatus::Ready,
        }
    }

    /// Fresh state at the start of a scan.
    pub fn scanning(total_pairs: usize) -> Self {
        Self {
            is_scanning: true,
            status: ScanStatus::Scanning,
            ..Self::ready(total_pairs)
        }
    }
}

/// `round(100 * processed / total)`, clamped to 100.
///
/// An empty universe counts as fully processed.
pub fn progress_pct(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Everything the presentation layer may observe about the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSnapshot {
    pub state: ScanState,
    pub best_signal: Option<SignalResult>,
    pub last_error: Option<String>,
}

impl ScanSnapshot {
    pub fn ready(total_pairs: usize) -> Self {
        Self {
            state: ScanState::ready(total_pairs),
            best_signal: None,
            last_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scan report
// ---------------------------------------------------------------------------

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcome {
    Completed,
    Cancelled,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanOutcome::Completed => write!(f, "Completed"),
            ScanOutcome::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Summary of one finished scan, handed back to whoever ran it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub predicted_time: String,
    pub outcome: ScanOutcome,
    pub processed_pairs: usize,
    pub total_pairs: usize,
    pub failed_pairs: usize,
    pub best_signal: Option<SignalResult>,
    pub elapsed_ms: u64,
}

impl ScanReport {
    /// Whether every attempted pair failed at the transport layer.
    pub fn all_failed(&self) -> bool {
        self.processed_pairs > 0 && self.failed_pairs == self.processed_pairs
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan {} {}: {}/{} pairs ({} failed) in {}ms, best: ",
            self.scan_id,
            self.outcome,
            self.processed_pairs,
            self.total_pairs,
            self.failed_pairs,
            self.elapsed_ms,
        )?;
        match &self.best_signal {
            Some(signal) => write!(f, "{signal}"),
            None => write!(f, "none"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the scanner.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Transport error ({pair}): {message}")]
    Transport { pair: String, message: String },

    #[error("Fetch timed out ({pair}) after {millis}ms")]
    Timeout { pair: String, millis: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
