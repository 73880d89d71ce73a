//! The run state machine.
//!
//! A run executes its fixed step list sequentially against a hard
//! wall-clock deadline. Every transition is persisted immediately, so a
//! crash between any two steps leaves the stored row consistent with the
//! work completed so far — that is what makes resume safe. Step failures
//! are never retried automatically; the only retry path is an explicit
//! caller-initiated resume.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use ceridwen_store::{RunRecord, RunStore};
use ceridwen_types::{RunInput, RunRequest, RunStatus, StepStatus};

use crate::catalog;
use crate::error::{EngineError, Result};
use crate::executor::StepExecutor;
use crate::slots::RunSlots;

/// Configuration for the run engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock budget for one orchestration pass.
    pub budget: std::time::Duration,

    /// Concurrent start/resume passes allowed.
    pub run_slots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget: catalog::RUN_BUDGET,
            run_slots: 1,
        }
    }
}

/// The run engine — owns the step state machine for orchestration runs.
pub struct RunEngine {
    store: RunStore,
    executor: Arc<dyn StepExecutor>,
    slots: RunSlots,
    config: EngineConfig,
}

impl RunEngine {
    pub fn new(store: RunStore, executor: Arc<dyn StepExecutor>, config: EngineConfig) -> Self {
        let slots = RunSlots::new(config.run_slots);
        Self {
            store,
            executor,
            slots,
            config,
        }
    }

    /// The engine's slot pool (shared with clones of this handle).
    pub fn slots(&self) -> &RunSlots {
        &self.slots
    }

    /// Create a run and execute it synchronously within this call.
    ///
    /// Input is normalized, the step catalog is built (video step only when
    /// requested), and the initial `running` row is persisted before the
    /// first step starts.
    pub async fn start(&self, subject_id: &str, request: &RunRequest) -> Result<RunRecord> {
        let _permit = self.slots.try_acquire().ok_or(EngineError::Busy)?;

        let input = RunInput::from_request(request);
        let steps = catalog::build_steps(input.include_video);
        let mut run = RunRecord::new(subject_id, input, steps);
        self.store.create_run(&run)?;

        info!(run_id = %run.id, subject_id, steps = run.steps.len(), "Run started");

        self.execute(&mut run, 0).await?;
        Ok(run)
    }

    /// Resume a `failed` run from its failure point.
    ///
    /// Only valid when the persisted status is `failed`; otherwise no
    /// mutation occurs. Provided input fields override stored ones. Every
    /// step from the first failed step onward is reset to pending;
    /// already-done steps are untouched and never re-execute.
    pub async fn resume(&self, run_id: &str, patch: &RunRequest) -> Result<RunRecord> {
        let _permit = self.slots.try_acquire().ok_or(EngineError::Busy)?;

        let mut run = self.store.get_run(run_id)?;
        if run.status != RunStatus::Failed {
            return Err(EngineError::InvalidState {
                id: run.id,
                status: run.status,
            });
        }

        run.input = run.input.merged(patch);

        let resume_idx = run
            .steps
            .iter()
            .position(|s| s.status == StepStatus::Failed)
            .or_else(|| run.steps.iter().position(|s| s.status != StepStatus::Done))
            .unwrap_or(run.steps.len());

        for step in run.steps.iter_mut().skip(resume_idx) {
            if step.status != StepStatus::Done {
                step.reset();
            }
        }
        for step in &run.steps[resume_idx..] {
            if step.status == StepStatus::Pending {
                run.output_refs.remove(&step.id);
            }
        }

        run.status = RunStatus::Running;
        run.last_error = None;
        run.current_step = run.steps.get(resume_idx).map(|s| s.id);
        self.store.update_run(&mut run)?;

        info!(run_id = %run.id, resume_from = ?run.current_step, "Run resumed");

        self.execute(&mut run, resume_idx).await?;
        Ok(run)
    }

    /// Read-only projection of the persisted run, for polling.
    pub fn snapshot(&self, run_id: &str) -> Result<RunRecord> {
        Ok(self.store.get_run(run_id)?)
    }

    /// Execute steps from `start_idx` onward until completion, failure, or
    /// deadline pre-emption. Persists after every transition.
    async fn execute(&self, run: &mut RunRecord, start_idx: usize) -> Result<()> {
        let deadline = Instant::now() + self.config.budget;

        for idx in start_idx..run.steps.len() {
            if run.steps[idx].status == StepStatus::Done {
                continue;
            }

            let step_id = run.steps[idx].id;
            let time_left = deadline.saturating_duration_since(Instant::now());
            let estimate = catalog::estimate_remaining(&run.steps[idx..]);

            if estimate > time_left {
                let msg = format!(
                    "Not started: the remaining steps need an estimated {}s but only {}s remain \
                     before the execution deadline. Retry with fewer channels or without video.",
                    estimate.as_secs(),
                    time_left.as_secs()
                );
                warn!(run_id = %run.id, step = %step_id, "Run pre-empted by deadline");
                return self.fail_step(run, idx, msg);
            }

            run.steps[idx].start();
            run.current_step = Some(step_id);
            self.store.update_run(run)?;

            debug!(run_id = %run.id, step = %step_id, "Step started");

            let result =
                tokio::time::timeout(time_left, self.executor.execute(step_id, run)).await;

            match result {
                Ok(Ok(output)) => {
                    run.output_refs.insert(step_id, output);
                    run.steps[idx].finish();
                    run.current_step = run.steps.get(idx + 1).map(|s| s.id);
                    self.store.update_run(run)?;
                    debug!(run_id = %run.id, step = %step_id, "Step done");
                }
                Ok(Err(failure)) => {
                    info!(run_id = %run.id, step = %step_id, error = %failure, "Step failed");
                    return self.fail_step(run, idx, failure.to_string());
                }
                Err(_elapsed) => {
                    let msg = format!(
                        "Step '{step_id}' aborted after exceeding the remaining execution budget"
                    );
                    warn!(run_id = %run.id, step = %step_id, "Step aborted at deadline");
                    return self.fail_step(run, idx, msg);
                }
            }
        }

        run.status = RunStatus::Done;
        run.current_step = None;
        run.last_error = None;
        self.store.update_run(run)?;
        info!(run_id = %run.id, "Run done");
        Ok(())
    }

    /// Mark step `idx` and the run as failed, persist, and halt.
    fn fail_step(&self, run: &mut RunRecord, idx: usize, msg: String) -> Result<()> {
        run.steps[idx].fail(msg.clone());
        run.status = RunStatus::Failed;
        run.current_step = Some(run.steps[idx].id);
        run.last_error = Some(msg);
        self.store.update_run(run)?;
        Ok(())
    }
}
