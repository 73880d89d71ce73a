//! Route handlers.

pub mod health;
pub mod runs;

pub use health::{HealthResponse, health_routes};
pub use runs::{
    CreateRunRequest, RetryRunRequest, RunSnapshotResponse, RunStartedResponse, StepView,
    create_run_handler, get_run_handler, retry_run_handler,
};
