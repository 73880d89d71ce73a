//! Typed step outputs.
//!
//! Each step produces a concrete output variant rather than a free-form
//! JSON blob, so consumers of `outputRefs` get exhaustiveness checking
//! when they match on a step's result.

use serde::{Deserialize, Serialize};

use crate::StepId;

/// Output reference produced by a completed step.
///
/// Tagged by step id on the wire: `{ "step": "draft-copy", ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum StepOutput {
    BrandVoice {
        document_id: String,
        summary: String,
    },
    Positioning {
        document_id: String,
    },
    CompetitiveAnalysis {
        document_id: String,
        competitor_count: u32,
    },
    /// One draft document per requested channel.
    DraftCopy {
        document_ids: Vec<String>,
    },
    EmailSequence {
        document_ids: Vec<String>,
    },
    ContentAtomization {
        asset_ids: Vec<String>,
    },
    Translation {
        locales: Vec<String>,
        document_ids: Vec<String>,
    },
    /// Kickoff handle for the asynchronous video render.
    VideoKickoff {
        job_id: String,
    },
}

impl StepOutput {
    /// The catalog step this output belongs to.
    pub fn step_id(&self) -> StepId {
        match self {
            StepOutput::BrandVoice { .. } => StepId::BrandVoice,
            StepOutput::Positioning { .. } => StepId::Positioning,
            StepOutput::CompetitiveAnalysis { .. } => StepId::CompetitiveAnalysis,
            StepOutput::DraftCopy { .. } => StepId::DraftCopy,
            StepOutput::EmailSequence { .. } => StepId::EmailSequence,
            StepOutput::ContentAtomization { .. } => StepId::ContentAtomization,
            StepOutput::Translation { .. } => StepId::Translation,
            StepOutput::VideoKickoff { .. } => StepId::VideoKickoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_by_step_id() {
        let out = StepOutput::DraftCopy {
            document_ids: vec!["doc-1".to_string(), "doc-2".to_string()],
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["step"], "draft-copy");
        assert_eq!(json["document_ids"][0], "doc-1");

        let back: StepOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn test_step_id_accessor() {
        let out = StepOutput::VideoKickoff {
            job_id: "vid-42".to_string(),
        };
        assert_eq!(out.step_id(), StepId::VideoKickoff);
    }
}
