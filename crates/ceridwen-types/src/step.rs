//! Step identifiers and per-step state.
//!
//! The step catalog is fixed and ordered: every run executes the same
//! sequence of content-generation steps, with the video kickoff appended
//! only when the caller asked for it. `StepId`'s derived ordering matches
//! catalog order, so it can key ordered maps directly.

use serde::{Deserialize, Serialize};

use crate::{StepOutput, Timestamp, now};

/// Identifier of one unit of work in the pipeline catalog.
///
/// Variant order is catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    BrandVoice,
    Positioning,
    CompetitiveAnalysis,
    DraftCopy,
    EmailSequence,
    ContentAtomization,
    Translation,
    VideoKickoff,
}

impl StepId {
    /// Stable wire identifier (kebab-case).
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::BrandVoice => "brand-voice",
            StepId::Positioning => "positioning",
            StepId::CompetitiveAnalysis => "competitive-analysis",
            StepId::DraftCopy => "draft-copy",
            StepId::EmailSequence => "email-sequence",
            StepId::ContentAtomization => "content-atomization",
            StepId::Translation => "translation",
            StepId::VideoKickoff => "video-kickoff",
        }
    }

    /// Human-readable label shown in the UI while polling.
    pub fn label(&self) -> &'static str {
        match self {
            StepId::BrandVoice => "Brand voice",
            StepId::Positioning => "Positioning",
            StepId::CompetitiveAnalysis => "Competitive analysis",
            StepId::DraftCopy => "Draft copy",
            StepId::EmailSequence => "Email sequence",
            StepId::ContentAtomization => "Content atomization",
            StepId::Translation => "Translation",
            StepId::VideoKickoff => "Video kickoff",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepId {
    type Err = UnknownStepId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand-voice" => Ok(StepId::BrandVoice),
            "positioning" => Ok(StepId::Positioning),
            "competitive-analysis" => Ok(StepId::CompetitiveAnalysis),
            "draft-copy" => Ok(StepId::DraftCopy),
            "email-sequence" => Ok(StepId::EmailSequence),
            "content-atomization" => Ok(StepId::ContentAtomization),
            "translation" => Ok(StepId::Translation),
            "video-kickoff" => Ok(StepId::VideoKickoff),
            other => Err(UnknownStepId(other.to_string())),
        }
    }
}

/// Error for a step id string outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStepId(pub String);

impl std::fmt::Display for UnknownStepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown step id: {}", self.0)
    }
}

impl std::error::Error for UnknownStepId {}

/// Status of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One unit of work inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: StepId,
    pub label: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    /// Create a fresh pending step for `id`.
    pub fn new(id: StepId) -> Self {
        Self {
            id,
            label: id.label().to_string(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Mark the step as running.
    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(now());
    }

    /// Mark the step as done.
    pub fn finish(&mut self) {
        self.status = StepStatus::Done;
        self.finished_at = Some(now());
    }

    /// Mark the step as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.finished_at = Some(now());
        self.error = Some(error.into());
    }

    /// Reset the step to pending, clearing timestamps and error.
    ///
    /// Used when resuming a failed run: every step from the failure point
    /// onward is reset, already-done steps are left untouched.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.finished_at = None;
        self.error = None;
    }
}

/// Ordered map of step id to its typed output.
pub type OutputRefs = std::collections::BTreeMap<StepId, StepOutput>;
