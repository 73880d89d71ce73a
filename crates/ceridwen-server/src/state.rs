//! Application state shared across handlers.

use std::sync::Arc;

use ceridwen_engine::RunEngine;
use ceridwen_limiter::AdmissionController;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The run engine.
    pub engine: Arc<RunEngine>,

    /// Admission controller consulted before run endpoints.
    pub limiter: Arc<AdmissionController>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(engine: RunEngine, limiter: AdmissionController, config: ServerConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            limiter: Arc::new(limiter),
            config: Arc::new(config),
        }
    }
}
