//! Shared types for the Ceridwen pipeline orchestrator.

pub mod input;
pub mod output;
pub mod step;

pub use input::{RunInput, RunRequest, Tone};
pub use output::StepOutput;
pub use step::{OutputRefs, StepId, StepRecord, StepStatus, UnknownStepId};

use serde::{Deserialize, Serialize};

/// UTC timestamp used across run and step records.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Done,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
