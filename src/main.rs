//! Signal scanner entry point.
//!
//! Loads configuration, initialises structured logging and wires the
//! candle source into the scan engine. With the control API enabled the
//! process serves start/cancel/state requests until Ctrl+C; otherwise
//! it runs a single scan, logging progress, and exits.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use signal_scanner::config::AppConfig;
use signal_scanner::dashboard;
use signal_scanner::engine::scanner::{ScanEngine, ScanSettings};
use signal_scanner::market::http::HttpCandleSource;
use signal_scanner::types::{ScanOutcome, ScanReport};

const BANNER: &str = r#"
  ____  _                   _   ____
 / ___|(_) __ _ _ __   __ _| | / ___|  ___ __ _ _ __
 \___ \| |/ _` | '_ \ / _` | | \___ \ / __/ _` | '_ \
  ___) | | (_| | | | | (_| | |  ___) | (_| (_| | | | |
 |____/|_|\__, |_| |_|\__,_|_| |____/ \___\__,_|_| |_|
          |___/
  Multi-pair signal analysis, 1-minute timeframe
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("SCANNER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        pairs = cfg.scanner.pairs.len(),
        batch_size = cfg.scanner.batch_size,
        history_len = cfg.scanner.history_len,
        base_url = %cfg.source.base_url,
        relayed = cfg.source.proxy_url.is_some(),
        "Signal scanner starting up"
    );

    let source = Arc::new(HttpCandleSource::new(&cfg.source)?);
    let engine = Arc::new(ScanEngine::new(
        source,
        ScanSettings::from_config(&cfg.scanner),
    )?);

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(Arc::clone(&engine), cfg.dashboard.port).await?;
        info!("Waiting for scan requests. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received.");
        engine.cancel();
        return Ok(());
    }

    run_once(engine).await
}

/// Run one scan in the foreground, cancelling on Ctrl+C.
async fn run_once(engine: Arc<ScanEngine>) -> Result<()> {
    let mut progress = engine.subscribe();
    let scan = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run_scan().await })
    };
    tokio::pin!(scan);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut shutdown_seen = false;

    let report = loop {
        tokio::select! {
            result = &mut scan => break result?,
            changed = progress.changed() => {
                if changed.is_err() {
                    continue;
                }
                let state = progress.borrow_and_update().state.clone();
                info!(
                    progress = state.progress,
                    processed = state.processed_pairs,
                    total = state.total_pairs,
                    failed = state.failed_pairs,
                    status = %state.status,
                    "Progress"
                );
            }
            _ = &mut shutdown, if !shutdown_seen => {
                shutdown_seen = true;
                warn!("Ctrl+C received, cancelling after the current batch");
                engine.cancel();
            }
        }
    };

    match report {
        Some(report) => log_scan_report(&report),
        None => warn!("A scan was already running"),
    }
    if let Some(message) = engine.last_error() {
        error!(error = %message, "Scan finished with errors");
    }
    Ok(())
}

/// Log a human-readable scan summary.
fn log_scan_report(report: &ScanReport) {
    info!(
        scan_id = %report.scan_id,
        outcome = %report.outcome,
        processed = report.processed_pairs,
        total = report.total_pairs,
        failed = report.failed_pairs,
        elapsed_ms = report.elapsed_ms,
        "Scan finished"
    );
    match (&report.outcome, &report.best_signal) {
        (ScanOutcome::Completed, Some(signal)) => println!("Strongest signal: {signal}"),
        (ScanOutcome::Completed, None) => println!("No strong signal found right now"),
        (ScanOutcome::Cancelled, _) => println!("Scan cancelled by user"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("signal_scanner=info"));

    let json_logging = std::env::var("SCANNER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
