//! Server Implementation
//!
//! HTTP server startup and graceful shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::core::{Config, Result, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (shared with tests or tooling)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// Build the full application router for the given state
    pub fn build_router(state: ServerState) -> Router {
        Router::new()
            .merge(api::products::router())
            .merge(api::cart::router())
            .merge(api::health::router())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config)
                .map_err(crate::core::ServerError::Internal)?,
        };

        state.start_background_tasks();

        let app = Self::build_router(state.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        tracing::info!("Shopie server listening on {}", addr);

        let handle = axum_server::Handle::new();
        tokio::spawn(shutdown_signal(
            handle.clone(),
            state,
            Duration::from_millis(self.config.shutdown_timeout_ms),
        ));

        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        tracing::info!("Shopie server stopped");
        Ok(())
    }
}

/// Wait for ctrl-c, then stop background tasks and drain requests
///
/// The handle is the `SocketAddr` one produced by `axum_server::bind`.
async fn shutdown_signal(
    handle: axum_server::Handle<SocketAddr>,
    state: ServerState,
    grace: Duration,
) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down...");
    state.shutdown.cancel();
    handle.graceful_shutdown(Some(grace));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_router_builds_over_initialized_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_overrides(dir.path().to_str().unwrap(), 0);
        let state = ServerState::initialize(&config).unwrap();

        let _app = Server::build_router(state.clone());

        let handle: axum_server::Handle<SocketAddr> = axum_server::Handle::new();
        drop(tokio::spawn(shutdown_signal(
            handle,
            state,
            Duration::from_millis(1),
        )));
    }
}
