//! Health API Handlers

use axum::{Json, extract::State};
use serde::Serialize;

use crate::core::ServerState;
use crate::invariant::InvariantReport;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub environment: String,
    pub products: usize,
}

/// GET /api/health - liveness
pub async fn health(State(state): State<ServerState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        environment: state.config.environment.clone(),
        products: state.reservation.snapshot().len(),
    })
}

/// GET /api/health/invariants - run a consistency check right now
pub async fn invariants(State(state): State<ServerState>) -> Json<InvariantReport> {
    Json(state.invariants.check_all())
}
