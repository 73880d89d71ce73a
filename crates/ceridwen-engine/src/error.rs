//! Error types for the run engine.

use thiserror::Error;

use ceridwen_types::RunStatus;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during run orchestration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Run not found.
    #[error("Run not found: {0}")]
    NotFound(String),

    /// The run is not in a state that permits the requested operation.
    #[error("Run {id} is {status}, only failed runs can be resumed")]
    InvalidState { id: String, status: RunStatus },

    /// All run slots are occupied.
    #[error("No free run slot, try again later")]
    Busy,

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(ceridwen_store::StoreError),
}

impl From<ceridwen_store::StoreError> for EngineError {
    fn from(e: ceridwen_store::StoreError) -> Self {
        match e {
            ceridwen_store::StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Storage(other),
        }
    }
}
