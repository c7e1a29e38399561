//! Health API module

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/health", get(handler::health))
        .route("/api/health/invariants", get(handler::invariants))
}
