//! HTTP candle source.
//!
//! Endpoint: `GET {base_url}/candles/last?asset={pair}&count={count}`
//! returning a JSON array of `{ "open", "close", "color" }` objects.
//! Prices arrive either as strings or numbers.
//!
//! When a relay is configured the request goes to
//! `{proxy_url}?url={encoded target}` instead, and the relay wraps the
//! upstream body as a string in `{ "contents": "..." }`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::CandleSource;
use crate::config::SourceConfig;
use crate::types::{Candle, CandleColor};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Price as sent by the feed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePrice {
    Text(String),
    Number(f64),
}

impl WirePrice {
    fn to_decimal(&self) -> Result<Decimal> {
        match self {
            WirePrice::Text(s) => Decimal::from_str(s.trim())
                .with_context(|| format!("Invalid price string: {s:?}")),
            WirePrice::Number(n) => Decimal::from_f64(*n)
                .with_context(|| format!("Invalid price number: {n}")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCandle {
    open: WirePrice,
    close: WirePrice,
    #[serde(default)]
    color: Option<String>,
}

impl WireCandle {
    fn into_candle(self) -> Result<Candle> {
        let open = self.open.to_decimal()?;
        let close = self.close.to_decimal()?;
        // Unknown or missing colours fall back to the prices.
        let color = self
            .color
            .as_deref()
            .and_then(|c| c.parse::<CandleColor>().ok())
            .unwrap_or_else(|| CandleColor::from_prices(open, close));
        Ok(Candle { open, close, color })
    }
}

/// Relay envelope: the upstream body as a string.
#[derive(Debug, Deserialize)]
struct RelayEnvelope {
    contents: Option<String>,
}

/// Parse a bare candle array.
pub fn parse_candles(body: &str) -> Result<Vec<Candle>> {
    let wire: Vec<WireCandle> =
        serde_json::from_str(body).context("Failed to parse candle array")?;
    wire.into_iter().map(WireCandle::into_candle).collect()
}

/// Parse a relay response wrapping a candle array.
pub fn parse_relayed_candles(body: &str) -> Result<Vec<Candle>> {
    let envelope: RelayEnvelope =
        serde_json::from_str(body).context("Failed to parse relay envelope")?;
    let contents = envelope
        .contents
        .context("Relay response has no contents")?;
    parse_candles(&contents)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Candle source backed by the HTTP candle endpoint.
pub struct HttpCandleSource {
    http: Client,
    base_url: String,
    proxy_url: Option<String>,
}

impl HttpCandleSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client for candle source")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            proxy_url: config.proxy_url.clone(),
        })
    }

    /// Direct endpoint URL for a pair.
    fn target_url(&self, pair: &str, count: usize) -> String {
        format!(
            "{}/candles/last?asset={}&count={count}",
            self.base_url,
            urlencoding::encode(pair),
        )
    }

    /// URL actually requested, relayed if configured.
    fn request_url(&self, pair: &str, count: usize) -> String {
        let target = self.target_url(pair, count);
        match &self.proxy_url {
            Some(proxy) => format!("{proxy}?url={}", urlencoding::encode(&target)),
            None => target,
        }
    }
}

#[async_trait]
impl CandleSource for HttpCandleSource {
    async fn fetch_candles(&self, pair: &str, count: usize) -> Result<Vec<Candle>> {
        let url = self.request_url(pair, count);
        debug!(pair, url = %url, "Fetching candles");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Candle request failed for {pair}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Candle API error {status}: {body}");
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read candle response for {pair}"))?;

        let candles = if self.proxy_url.is_some() {
            parse_relayed_candles(&body)?
        } else {
            parse_candles(&body)?
        };

        debug!(pair, count = candles.len(), "Candles received");
        Ok(candles)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
