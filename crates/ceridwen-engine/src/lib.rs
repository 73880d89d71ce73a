//! Run engine for Ceridwen — durable, resumable step orchestration.
//!
//! One run executes a fixed, linear sequence of content-generation steps
//! against a hard wall-clock budget. Progress is persisted after every
//! transition, so a crashed or timed-out run resumes from the failed step
//! rather than starting over.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  RunEngine                                             │
//! │  - step catalog + static per-step cost estimates       │
//! │  - deadline-budgeted sequential execution              │
//! │  - per-transition persistence (optimistic versioning)  │
//! │  - resume-from-failed                                  │
//! │  - RunSlots semaphore bounding concurrent passes       │
//! └────────────────────────────────────────────────────────┘
//!            │ StepExecutor (out-of-scope step functions)
//! ```

pub mod catalog;
pub mod engine;
pub mod error;
pub mod executor;
pub mod slots;

pub use catalog::{BASE_CATALOG, RUN_BUDGET, build_steps, estimate_remaining, estimated_cost};
pub use engine::{EngineConfig, RunEngine};
pub use error::{EngineError, Result};
pub use executor::{StepExecutor, StepFailure, UnconfiguredExecutor};
pub use slots::{RunPermit, RunSlots};

#[cfg(feature = "testing")]
pub use executor::testing;
