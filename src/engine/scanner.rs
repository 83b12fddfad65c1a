//! Batched pair scanner.
//!
//! Walks the pair universe in fixed-size batches. Fetches inside a batch
//! run concurrently; batches run one after another. After each batch the
//! results are evaluated in pair order, folded into the running best
//! signal, and a progress snapshot is published. Cancellation is polled
//! only at batch boundaries, so an in-flight batch always settles.
//!
//! The engine is the only writer of the published [`ScanSnapshot`].
//! Observers read it through [`ScanEngine::snapshot`] or subscribe to
//! every publication with [`ScanEngine::subscribe`].

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use futures::future::join_all;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ScannerConfig;
use crate::market::CandleSource;
use crate::signal::evaluate;
use crate::types::{
    progress_pct, Candle, ScanError, ScanOutcome, ScanReport, ScanSnapshot, ScanState,
    ScanStatus, SignalResult,
};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Static inputs of every scan.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Ordered pair universe.
    pub pairs: Vec<String>,
    pub batch_size: usize,
    /// Candles requested per pair.
    pub history_len: usize,
    /// Upper bound on a single fetch. `None` waits forever.
    pub fetch_timeout: Option<Duration>,
}

impl ScanSettings {
    pub fn from_config(cfg: &ScannerConfig) -> Self {
        Self {
            pairs: cfg.pairs.clone(),
            batch_size: cfg.batch_size,
            history_len: cfg.history_len,
            fetch_timeout: cfg.fetch_timeout(),
        }
    }
}

/// `HH:MM` one minute after `now`.
pub fn predicted_time<Tz: TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    (now + chrono::Duration::minutes(1)).format("%H:%M").to_string()
}

// ---------------------------------------------------------------------------
// Per-scan bookkeeping
// ---------------------------------------------------------------------------

/// Identity of one running scan.
struct ScanContext {
    scan_id: Uuid,
    predicted_time: String,
    started: Instant,
}

/// Running totals of one scan, owned by the orchestrating loop.
#[derive(Debug, Default)]
struct ScanTally {
    best: Option<SignalResult>,
    processed: usize,
    failed: usize,
    last_failure: Option<String>,
}

impl ScanTally {
    /// Keep `candidate` only if it is strictly stronger than the current best.
    /// Equal strength keeps the signal found first.
    fn offer(&mut self, candidate: SignalResult) {
        let stronger = self
            .best
            .as_ref()
            .map_or(true, |best| candidate.strength > best.strength);
        if stronger {
            self.best = Some(candidate);
        }
    }

    fn into_report(
        self,
        ctx: &ScanContext,
        outcome: ScanOutcome,
        total: usize,
    ) -> ScanReport {
        ScanReport {
            scan_id: ctx.scan_id,
            predicted_time: ctx.predicted_time.clone(),
            outcome,
            processed_pairs: self.processed,
            total_pairs: total,
            failed_pairs: self.failed,
            best_signal: match outcome {
                ScanOutcome::Completed => self.best,
                ScanOutcome::Cancelled => None,
            },
            elapsed_ms: ctx.started.elapsed().as_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs scans over the configured pair universe, one at a time.
pub struct ScanEngine {
    source: Arc<dyn CandleSource>,
    settings: ScanSettings,
    snapshot: watch::Sender<ScanSnapshot>,
    cancelled: AtomicBool,
}

impl ScanEngine {
    pub fn new(source: Arc<dyn CandleSource>, settings: ScanSettings) -> Result<Self> {
        if settings.batch_size == 0 {
            return Err(ScanError::Config("batch size must be positive".into()).into());
        }
        let (snapshot, _) = watch::channel(ScanSnapshot::ready(settings.pairs.len()));
        Ok(Self {
            source,
            settings,
            snapshot,
            cancelled: AtomicBool::new(false),
        })
    }

    // -- Commands --------------------------------------------------------

    /// Start a scan in the background.
    ///
    /// Returns `false` (and changes nothing) if a scan is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(ctx) = self.begin() else {
            return false;
        };
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.execute(ctx).await;
        });
        true
    }

    /// Run a scan to completion on the current task.
    ///
    /// Returns `None` if another scan is already running.
    pub async fn run_scan(&self) -> Option<ScanReport> {
        let ctx = self.begin()?;
        Some(self.execute(ctx).await)
    }

    /// Request cancellation of the running scan.
    ///
    /// Takes effect before the next batch; the current batch still
    /// settles. Returns `false` when no scan is running.
    pub fn cancel(&self) -> bool {
        let accepted = self.snapshot.send_if_modified(|snap| {
            if !snap.state.is_scanning {
                return false;
            }
            self.cancelled.store(true, Ordering::SeqCst);
            snap.state.status = ScanStatus::Cancelling;
            true
        });
        if accepted {
            info!("Scan cancellation requested");
        }
        accepted
    }

    // -- Observers -------------------------------------------------------

    pub fn snapshot(&self) -> ScanSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> ScanState {
        self.snapshot.borrow().state.clone()
    }

    /// Strongest signal of the last completed scan.
    pub fn best_signal(&self) -> Option<SignalResult> {
        self.snapshot.borrow().best_signal.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.snapshot.borrow().last_error.clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.snapshot.borrow().state.is_scanning
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn pairs(&self) -> &[String] {
        &self.settings.pairs
    }

    // -- Scan lifecycle --------------------------------------------------

    /// Reset state for a new scan, atomically with the "already running" check.
    fn begin(&self) -> Option<ScanContext> {
        let total = self.settings.pairs.len();
        let started = self.snapshot.send_if_modified(|snap| {
            if snap.state.is_scanning {
                return false;
            }
            self.cancelled.store(false, Ordering::SeqCst);
            *snap = ScanSnapshot {
                state: ScanState::scanning(total),
                best_signal: None,
                last_error: None,
            };
            true
        });

        if !started {
            debug!("Scan already running, start ignored");
            return None;
        }

        Some(ScanContext {
            scan_id: Uuid::new_v4(),
            predicted_time: predicted_time(Local::now()),
            started: Instant::now(),
        })
    }

    async fn execute(&self, ctx: ScanContext) -> ScanReport {
        let span = info_span!("scan", scan_id = %ctx.scan_id);
        self.scan_batches(ctx).instrument(span).await
    }

    async fn scan_batches(&self, ctx: ScanContext) -> ScanReport {
        let total = self.settings.pairs.len();
        info!(
            total,
            batch_size = self.settings.batch_size,
            predicted_time = %ctx.predicted_time,
            "Scan started"
        );

        let mut tally = ScanTally::default();

        for (index, batch) in self.settings.pairs.chunks(self.settings.batch_size).enumerate() {
            if self.cancel_requested() {
                return self.finish_cancelled(&ctx, tally, total);
            }

            // join_all yields in input order, whatever order fetches settle in.
            let outcomes = join_all(batch.iter().map(|pair| self.fetch_pair(pair))).await;

            for (pair, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(candles) => match evaluate(&candles) {
                        Some(eval) => {
                            let signal = eval.into_signal(pair, &ctx.predicted_time);
                            debug!(
                                pair = %pair,
                                direction = %signal.direction,
                                strength = signal.strength,
                                "Signal found"
                            );
                            tally.offer(signal);
                        }
                        None => debug!(pair = %pair, candles = candles.len(), "No signal"),
                    },
                    Err(e) => {
                        warn!(pair = %pair, error = %e, "Pair fetch failed");
                        tally.failed += 1;
                        tally.last_failure = Some(e.to_string());
                    }
                }
            }

            tally.processed += batch.len();
            self.publish_progress(&tally, total);
            debug!(
                batch = index + 1,
                processed = tally.processed,
                failed = tally.failed,
                "Batch settled"
            );
        }

        // A cancel that lands during the final batch still wins.
        if self.cancel_requested() {
            return self.finish_cancelled(&ctx, tally, total);
        }
        self.finish_completed(&ctx, tally, total)
    }

    /// Fetch one pair, folding every failure mode into a [`ScanError`].
    async fn fetch_pair(&self, pair: &str) -> Result<Vec<Candle>, ScanError> {
        let fetch = self.source.fetch_candles(pair, self.settings.history_len);

        let result = match self.settings.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ScanError::Timeout {
                        pair: pair.to_string(),
                        millis: limit.as_millis() as u64,
                    })
                }
            },
            None => fetch.await,
        };

        result.map_err(|e| ScanError::Transport {
            pair: pair.to_string(),
            message: format!("{e:#}"),
        })
    }

    fn cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn publish_progress(&self, tally: &ScanTally, total: usize) {
        self.snapshot.send_modify(|snap| {
            let state = &mut snap.state;
            state.processed_pairs = tally.processed.min(total);
            state.failed_pairs = tally.failed;
            state.progress = progress_pct(tally.processed, total);
            // Keep "Cancelling..." visible until the boundary check.
            if !self.cancel_requested() {
                state.status = ScanStatus::Processing {
                    processed: state.processed_pairs,
                    total,
                };
            }
        });
    }

    fn finish_cancelled(&self, ctx: &ScanContext, tally: ScanTally, total: usize) -> ScanReport {
        self.snapshot.send_modify(|snap| {
            snap.state.is_scanning = false;
            snap.state.is_cancelled = true;
            snap.state.status = ScanStatus::Cancelled;
        });

        let report = tally.into_report(ctx, ScanOutcome::Cancelled, total);
        info!(
            processed = report.processed_pairs,
            total,
            failed = report.failed_pairs,
            elapsed_ms = report.elapsed_ms,
            "Scan cancelled"
        );
        report
    }

    fn finish_completed(&self, ctx: &ScanContext, tally: ScanTally, total: usize) -> ScanReport {
        let all_failed = total > 0 && tally.failed == total;
        let last_error = all_failed.then(|| {
            format!(
                "All {total} pairs failed to fetch (last error: {})",
                tally.last_failure.as_deref().unwrap_or("unknown")
            )
        });
        let best = tally.best.clone();
        let failed = tally.failed;

        self.snapshot.send_modify(|snap| {
            snap.state.is_scanning = false;
            snap.state.progress = 100;
            snap.state.processed_pairs = total;
            snap.state.failed_pairs = failed;
            snap.state.status = if best.is_some() {
                ScanStatus::Complete
            } else {
                ScanStatus::NoSignal
            };
            snap.best_signal = best;
            snap.last_error = last_error.clone();
        });

        if let Some(message) = &last_error {
            error!(failed, total, "{message}");
        }

        let report = tally.into_report(ctx, ScanOutcome::Completed, total);
        match &report.best_signal {
            Some(signal) => info!(
                pair = %signal.pair,
                direction = %signal.direction,
                strength = signal.strength,
                predicted_time = %signal.predicted_time,
                failed,
                elapsed_ms = report.elapsed_ms,
                "Scan complete"
            ),
            None => info!(failed, elapsed_ms = report.elapsed_ms, "Scan complete, no signal"),
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
