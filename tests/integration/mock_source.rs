//! Scripted candle source for integration testing.
//!
//! Every pair gets a fixed response. Fetches can be delayed, held at a
//! gate until the test releases them, or hang forever. The source
//! records start/finish events and the peak number of in-flight fetches
//! so tests can check batching behaviour.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use signal_scanner::market::CandleSource;
use signal_scanner::types::Candle;

/// What a pair's fetch does.
#[derive(Debug, Clone)]
pub enum Script {
    Candles(Vec<Candle>),
    Fail(String),
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Holds one pair's fetch until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

pub struct MockSource {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    gates: HashMap<String, Arc<Gate>>,
    events: Mutex<Vec<Event>>,
    counts: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even when a fetch is dropped mid-way.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delays: HashMap::new(),
            gates: HashMap::new(),
            events: Mutex::new(Vec::new()),
            counts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, pair: &str, script: Script) -> Self {
        self.scripts.insert(pair.to_string(), script);
        self
    }

    pub fn with_delay(mut self, pair: &str, delay: Duration) -> Self {
        self.delays.insert(pair.to_string(), delay);
        self
    }

    /// Hold `pair`'s fetch until the returned gate is released.
    pub fn gate(&mut self, pair: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.insert(pair.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn started(&self, pair: &str) -> bool {
        self.events().contains(&Event::Started(pair.to_string()))
    }

    /// Position of an event in the log.
    pub fn position(&self, event: Event) -> Option<usize> {
        self.events().iter().position(|e| *e == event)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requested_counts(&self) -> Vec<usize> {
        self.counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandleSource for MockSource {
    async fn fetch_candles(&self, pair: &str, count: usize) -> Result<Vec<Candle>> {
        self.events.lock().unwrap().push(Event::Started(pair.to_string()));
        self.counts.lock().unwrap().push(count);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(gate) = self.gates.get(pair) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(delay) = self.delays.get(pair) {
            tokio::time::sleep(*delay).await;
        }

        let result = match self.scripts.get(pair) {
            Some(Script::Candles(candles)) => Ok(candles.clone()),
            Some(Script::Fail(message)) => Err(anyhow!("{message}")),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(anyhow!("unknown pair {pair}")),
        };

        self.events.lock().unwrap().push(Event::Finished(pair.to_string()));
        result
    }
}

// ---------------------------------------------------------------------------
// Candle fixtures
// ---------------------------------------------------------------------------

/// Fifteen rising candles with growing bodies: CALL, strength 3.
pub fn call_three() -> Vec<Candle> {
    (0..15u32)
        .map(|i| {
            let open = dec!(1.08000) + Decimal::from(i) * dec!(0.0005);
            Candle::new(open, open + dec!(0.0001) * Decimal::from(i + 1))
        })
        .collect()
}

/// Rising candles whose last body shrinks: CALL, strength 2.
pub fn call_two() -> Vec<Candle> {
    let mut candles = call_three();
    let last = candles.len() - 1;
    candles[last] = Candle::new(dec!(1.09000), dec!(1.09001));
    candles
}

/// Falling candles whose last body shrinks: PUT, strength 2.
pub fn put_two() -> Vec<Candle> {
    call_two()
        .iter()
        .map(|c| Candle::new(dec!(3) - c.open, dec!(3) - c.close))
        .collect()
}

/// Alternating colours with even bodies: no signal.
pub fn choppy() -> Vec<Candle> {
    (0..15)
        .map(|i| {
            if i % 2 == 0 {
                Candle::new(dec!(1.1000), dec!(1.1010))
            } else {
                Candle::new(dec!(1.1010), dec!(1.1000))
            }
        })
        .collect()
}

/// Too short to evaluate, even though it trends.
pub fn short_history() -> Vec<Candle> {
    call_three().into_iter().take(10).collect()
}
