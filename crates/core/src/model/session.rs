use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::content::PhaseContent;
use crate::model::ids::SessionId;
use crate::model::level::Level;
use crate::model::ordering::{PhaseNumber, PhaseOrdering, Skill};

/// Server-side lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initialized,
    Phase1Selected,
    Phase1Generated,
    Phase1InProgress,
    Phase1Completed,
    Phase2Generated,
    Phase2InProgress,
    Phase2Completed,
    Completed,
}

/// Final composite scores on the 0–9 band scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    #[serde(default)]
    pub overall: f64,
    #[serde(default)]
    pub listening: f64,
    #[serde(default)]
    pub reading: f64,
    #[serde(default)]
    pub writing: f64,
    #[serde(default)]
    pub speaking: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<serde_json::Value>,
}

impl FinalResults {
    #[must_use]
    pub fn band(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Listening => self.listening,
            Skill::Reading => self.reading,
            Skill::Writing => self.writing,
            Skill::Speaking => self.speaking,
        }
    }

    /// Mean of the four skill bands, rounded to one decimal place.
    #[must_use]
    pub fn mean_band(listening: f64, reading: f64, writing: f64, speaking: f64) -> f64 {
        ((listening + reading + writing + speaking) / 4.0 * 10.0).round() / 10.0
    }
}

/// Client-side copy of a session record as returned by the remote service.
///
/// Score blobs are opaque; the controller only inspects content presence and
/// the phase ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    #[serde(deserialize_with = "crate::model::level::deserialize_lenient")]
    pub level: Level,
    #[serde(default)]
    pub selected_phase: Option<PhaseOrdering>,
    pub status: SessionStatus,
    #[serde(default)]
    pub phase1_content: Option<PhaseContent>,
    #[serde(default)]
    pub phase2_content: Option<PhaseContent>,
    #[serde(default)]
    pub phase1_scores: Option<serde_json::Value>,
    #[serde(default)]
    pub phase2_scores: Option<serde_json::Value>,
    #[serde(default)]
    pub final_results: Option<FinalResults>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    #[must_use]
    pub fn content_for(&self, phase: PhaseNumber) -> Option<&PhaseContent> {
        match phase {
            PhaseNumber::One => self.phase1_content.as_ref(),
            PhaseNumber::Two => self.phase2_content.as_ref(),
        }
    }

    #[must_use]
    pub fn scores_for(&self, phase: PhaseNumber) -> Option<&serde_json::Value> {
        match phase {
            PhaseNumber::One => self.phase1_scores.as_ref(),
            PhaseNumber::Two => self.phase2_scores.as_ref(),
        }
    }

    /// Skills presented in `phase`, or `None` until an ordering is chosen.
    #[must_use]
    pub fn skills_for(&self, phase: PhaseNumber) -> Option<[Skill; 2]> {
        self.selected_phase.map(|ordering| ordering.skills_for(phase))
    }
}
