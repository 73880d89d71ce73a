//! Run input normalization.
//!
//! Callers submit a loosely-typed `RunRequest`; the engine only ever works
//! with the normalized `RunInput`. The same request type doubles as the
//! override patch accepted by a retry.

use serde::{Deserialize, Serialize};

/// Desired voice for generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Friendly,
    Bold,
    Playful,
    Technical,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Professional
    }
}

impl Tone {
    /// Parse a caller-supplied tone, falling back to the default for
    /// unknown or empty values.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "professional" => Tone::Professional,
            "friendly" => Tone::Friendly,
            "bold" => Tone::Bold,
            "playful" => Tone::Playful,
            "technical" => Tone::Technical,
            _ => Tone::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Bold => "bold",
            Tone::Playful => "playful",
            Tone::Technical => "technical",
        }
    }
}

/// Raw caller input for starting a run, or the override patch for a retry.
///
/// All fields are optional; absent fields fall back to defaults on start
/// and to previously stored values on retry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub goal: Option<String>,
    pub tone: Option<String>,
    pub channels: Option<Vec<String>>,
    pub include_video: Option<bool>,
}

/// Normalized run input, as persisted on the run row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    /// Campaign goal, trimmed; `None` when absent or blank.
    pub goal: Option<String>,
    pub tone: Tone,
    /// Lower-cased, trimmed, deduplicated channel names (first-seen order).
    pub channels: Vec<String>,
    pub include_video: bool,
}

impl RunInput {
    /// Normalize a raw request into run input.
    pub fn from_request(req: &RunRequest) -> Self {
        Self {
            goal: normalize_goal(req.goal.as_deref()),
            tone: req.tone.as_deref().map(Tone::parse).unwrap_or_default(),
            channels: normalize_channels(req.channels.as_deref().unwrap_or(&[])),
            include_video: req.include_video.unwrap_or(false),
        }
    }

    /// Apply a retry override patch: provided fields replace stored values,
    /// omitted fields are retained.
    pub fn merged(&self, patch: &RunRequest) -> Self {
        Self {
            goal: match patch.goal.as_deref() {
                Some(g) => normalize_goal(Some(g)),
                None => self.goal.clone(),
            },
            tone: patch.tone.as_deref().map(Tone::parse).unwrap_or(self.tone),
            channels: match patch.channels.as_deref() {
                Some(c) => normalize_channels(c),
                None => self.channels.clone(),
            },
            include_video: patch.include_video.unwrap_or(self.include_video),
        }
    }
}

fn normalize_goal(goal: Option<&str>) -> Option<String> {
    goal.map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
}

fn normalize_channels(channels: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for ch in channels {
        let ch = ch.trim().to_lowercase();
        if !ch.is_empty() && seen.insert(ch.clone()) {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_parse_fallback() {
        assert_eq!(Tone::parse("Friendly"), Tone::Friendly);
        assert_eq!(Tone::parse("  BOLD "), Tone::Bold);
        assert_eq!(Tone::parse("sarcastic"), Tone::Professional);
        assert_eq!(Tone::parse(""), Tone::Professional);
    }

    #[test]
    fn test_from_request_defaults() {
        let input = RunInput::from_request(&RunRequest::default());
        assert_eq!(input.goal, None);
        assert_eq!(input.tone, Tone::Professional);
        assert!(input.channels.is_empty());
        assert!(!input.include_video);
    }

    #[test]
    fn test_goal_trimmed_to_none() {
        let req = RunRequest {
            goal: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(RunInput::from_request(&req).goal, None);

        let req = RunRequest {
            goal: Some("  launch Q3 campaign  ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            RunInput::from_request(&req).goal.as_deref(),
            Some("launch Q3 campaign")
        );
    }

    #[test]
    fn test_channels_normalized() {
        let req = RunRequest {
            channels: Some(vec![
                "Email".to_string(),
                " twitter ".to_string(),
                "".to_string(),
                "email".to_string(),
                "LinkedIn".to_string(),
            ]),
            ..Default::default()
        };
        let input = RunInput::from_request(&req);
        assert_eq!(input.channels, vec!["email", "twitter", "linkedin"]);
    }

    #[test]
    fn test_merged_overrides_and_retains() {
        let base = RunInput::from_request(&RunRequest {
            goal: Some("original goal".to_string()),
            tone: Some("bold".to_string()),
            channels: Some(vec!["email".to_string()]),
            include_video: Some(true),
        });

        // Omitted fields keep prior values
        let merged = base.merged(&RunRequest::default());
        assert_eq!(merged, base);

        // Provided fields win
        let merged = base.merged(&RunRequest {
            goal: None,
            tone: Some("playful".to_string()),
            channels: Some(vec!["Twitter".to_string()]),
            include_video: Some(false),
        });
        assert_eq!(merged.goal.as_deref(), Some("original goal"));
        assert_eq!(merged.tone, Tone::Playful);
        assert_eq!(merged.channels, vec!["twitter"]);
        assert!(!merged.include_video);
    }

    #[test]
    fn test_merged_blank_goal_clears() {
        let base = RunInput::from_request(&RunRequest {
            goal: Some("keep me".to_string()),
            ..Default::default()
        });
        let merged = base.merged(&RunRequest {
            goal: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.goal, None);
    }
}
