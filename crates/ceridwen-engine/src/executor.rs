//! The step-function boundary.
//!
//! Content generation itself (scraping, prompting, rendering) lives behind
//! [`StepExecutor`]. The engine only cares that a step either yields a
//! typed output or fails with a message.

use async_trait::async_trait;
use thiserror::Error;

use ceridwen_store::RunRecord;
use ceridwen_types::{StepId, StepOutput};

/// Opaque step failure message, persisted verbatim on the step and run.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StepFailure(pub String);

impl StepFailure {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Executes one catalog step against external services.
///
/// Implementations may inspect the run's normalized input and the outputs
/// of earlier steps via `run.output_refs`.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: StepId, run: &RunRecord) -> Result<StepOutput, StepFailure>;
}

/// Executor wired when no content backend is configured; every step fails
/// with a clear message instead of hanging.
pub struct UnconfiguredExecutor;

#[async_trait]
impl StepExecutor for UnconfiguredExecutor {
    async fn execute(&self, step: StepId, _run: &RunRecord) -> Result<StepOutput, StepFailure> {
        Err(StepFailure::new(format!(
            "No content backend configured for step '{step}'"
        )))
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! Scripted executors for engine and server tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// A plausible output for `step`, used by scripted executors.
    pub fn sample_output(step: StepId) -> StepOutput {
        match step {
            StepId::BrandVoice => StepOutput::BrandVoice {
                document_id: "doc-brand-voice".to_string(),
                summary: "confident, plain-spoken".to_string(),
            },
            StepId::Positioning => StepOutput::Positioning {
                document_id: "doc-positioning".to_string(),
            },
            StepId::CompetitiveAnalysis => StepOutput::CompetitiveAnalysis {
                document_id: "doc-competitive".to_string(),
                competitor_count: 3,
            },
            StepId::DraftCopy => StepOutput::DraftCopy {
                document_ids: vec!["doc-draft-1".to_string()],
            },
            StepId::EmailSequence => StepOutput::EmailSequence {
                document_ids: vec!["doc-email-1".to_string(), "doc-email-2".to_string()],
            },
            StepId::ContentAtomization => StepOutput::ContentAtomization {
                asset_ids: vec!["asset-1".to_string()],
            },
            StepId::Translation => StepOutput::Translation {
                locales: vec!["de".to_string(), "fr".to_string()],
                document_ids: vec!["doc-de".to_string(), "doc-fr".to_string()],
            },
            StepId::VideoKickoff => StepOutput::VideoKickoff {
                job_id: "vid-1".to_string(),
            },
        }
    }

    /// What a scripted executor should do for one step.
    #[derive(Debug, Clone)]
    pub enum Script {
        Succeed,
        Fail(String),
        /// Sleep for the duration, then succeed. Used to exercise the
        /// mid-flight deadline abort.
        Stall(Duration),
    }

    /// Executor driven by a per-step script; unscripted steps succeed with
    /// [`sample_output`]. Records the order steps were invoked in.
    pub struct ScriptedExecutor {
        scripts: Mutex<HashMap<StepId, Script>>,
        invoked: Mutex<Vec<StepId>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                invoked: Mutex::new(Vec::new()),
            }
        }

        pub fn with_script(self, step: StepId, script: Script) -> Self {
            self.scripts.lock().unwrap().insert(step, script);
            self
        }

        /// Replace the script for a step (e.g. flip a failure to success
        /// before a resume).
        pub fn set_script(&self, step: StepId, script: Script) {
            self.scripts.lock().unwrap().insert(step, script);
        }

        /// Steps invoked so far, in order.
        pub fn invocations(&self) -> Vec<StepId> {
            self.invoked.lock().unwrap().clone()
        }
    }

    impl Default for ScriptedExecutor {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl StepExecutor for ScriptedExecutor {
        async fn execute(&self, step: StepId, _run: &RunRecord) -> Result<StepOutput, StepFailure> {
            self.invoked.lock().unwrap().push(step);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(&step)
                .cloned()
                .unwrap_or(Script::Succeed);
            match script {
                Script::Succeed => Ok(sample_output(step)),
                Script::Fail(msg) => Err(StepFailure::new(msg)),
                Script::Stall(d) => {
                    tokio::time::sleep(d).await;
                    Ok(sample_output(step))
                }
            }
        }
    }
}
