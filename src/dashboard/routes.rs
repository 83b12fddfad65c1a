//! Control API route handlers.
//!
//! All endpoints return JSON. The engine itself is the shared state.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::scanner::ScanEngine;
use crate::types::ScanSnapshot;

pub type AppState = Arc<ScanEngine>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    /// `false` when a scan was already running.
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    /// `false` when there was nothing to cancel.
    pub cancelling: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairsResponse {
    pub pairs: Vec<String>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/state
pub async fn get_state(State(engine): State<AppState>) -> Json<ScanSnapshot> {
    Json(engine.snapshot())
}

/// POST /api/scan
pub async fn start_scan(State(engine): State<AppState>) -> (StatusCode, Json<StartResponse>) {
    let started = engine.start();
    let status = if started {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(StartResponse { started }))
}

/// POST /api/cancel
pub async fn cancel_scan(State(engine): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelling: engine.cancel(),
    })
}

/// GET /api/pairs
pub async fn get_pairs(State(engine): State<AppState>) -> Json<PairsResponse> {
    let pairs = engine.pairs().to_vec();
    Json(PairsResponse {
        total: pairs.len(),
        pairs,
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
