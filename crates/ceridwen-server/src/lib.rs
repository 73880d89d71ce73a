//! HTTP server for the ceridwen orchestration engine.
//!
//! Exposes the run lifecycle over a small JSON API:
//!
//! - `POST /runs` — create and execute a run
//! - `GET /runs/{runId}` — poll a run snapshot
//! - `POST /runs/{runId}/retry` — resume a failed run
//! - `GET /health` — liveness, ungated
//!
//! Run endpoints pass through the admission middleware before reaching a
//! handler; a denial returns `429` with a `Retry-After` header.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use ceridwen_engine::RunEngine;
use ceridwen_limiter::AdmissionController;

use crate::ratelimit::{admission_middleware, request_logging_middleware};
use crate::routes::{create_run_handler, get_run_handler, health_routes, retry_run_handler};

/// The HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from its parts.
    pub fn new(engine: RunEngine, limiter: AdmissionController, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(engine, limiter, config),
        }
    }

    /// Create a server over existing shared state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/runs", post(create_run_handler))
            .route("/runs/{run_id}", get(get_run_handler))
            .route("/runs/{run_id}/retry", post(retry_run_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                admission_middleware,
            ))
            .merge(health_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.state.config.bind_address;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(address = %addr, "Server listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
