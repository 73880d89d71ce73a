//! The fixed step catalog, per-step cost estimates, and the run budget.

use std::time::Duration;

use ceridwen_types::{StepId, StepRecord, StepStatus};

/// Maximum wall-clock budget for one orchestration pass.
///
/// Sits under the platform's own request-timeout ceiling (300 s) so the
/// engine always fails a run itself instead of being killed mid-write.
pub const RUN_BUDGET: Duration = Duration::from_secs(295);

/// The seven base steps, in execution order.
pub const BASE_CATALOG: [StepId; 7] = [
    StepId::BrandVoice,
    StepId::Positioning,
    StepId::CompetitiveAnalysis,
    StepId::DraftCopy,
    StepId::EmailSequence,
    StepId::ContentAtomization,
    StepId::Translation,
];

/// Build a fresh pending step list, appending the video kickoff step only
/// when the caller requested video.
pub fn build_steps(include_video: bool) -> Vec<StepRecord> {
    let mut steps: Vec<StepRecord> = BASE_CATALOG.iter().map(|&id| StepRecord::new(id)).collect();
    if include_video {
        steps.push(StepRecord::new(StepId::VideoKickoff));
    }
    steps
}

/// Estimated duration of one step, calibrated from observed external-API
/// latency. Static by choice; the estimate only gates whether a step is
/// attempted at all.
pub fn estimated_cost(step: StepId) -> Duration {
    let ms = match step {
        StepId::BrandVoice => 15_000,
        StepId::Positioning => 12_000,
        StepId::CompetitiveAnalysis => 20_000,
        StepId::DraftCopy => 45_000,
        StepId::EmailSequence => 30_000,
        StepId::ContentAtomization => 25_000,
        StepId::Translation => 40_000,
        StepId::VideoKickoff => 30_000,
    };
    Duration::from_millis(ms)
}

/// Sum of cost estimates for every not-yet-done step in the slice.
pub fn estimate_remaining(steps: &[StepRecord]) -> Duration {
    steps
        .iter()
        .filter(|s| s.status != StepStatus::Done)
        .map(|s| estimated_cost(s.id))
        .sum()
}
