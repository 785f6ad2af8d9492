use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use steer_config::Bands;
use steer_domain::{
	detected::DetectedDomain,
	entity::{Entity, MatchedEntity},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
	#[default]
	Active,
	Inactive,
}

/// Read-only snapshot of a rankable record. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub domains: Vec<String>,
	pub tier: u32,
	#[serde(default)]
	pub priority: i32,
	#[serde(default)]
	pub status: CandidateStatus,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl Candidate {
	pub fn display_name(&self) -> &str {
		if self.name.trim().is_empty() { self.id.as_str() } else { self.name.as_str() }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
	pub candidate_id: String,
	pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordHit {
	pub candidate_id: String,
	pub content: String,
	/// Native engine relevance. `None` means a plain hit.
	pub rank: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHit {
	pub candidate_id: String,
	pub stored_entities: Vec<Entity>,
}

/// Per-candidate signals. An absent signal means that scorer returned nothing for the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
	pub candidate_id: String,
	pub vector: Option<f64>,
	pub keyword: Option<f64>,
	pub entity: Option<f64>,
	pub combined: f64,
	pub entity_match_fraction: f64,
	pub boosted: f64,
	#[serde(default)]
	pub matched_entities: Vec<MatchedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
	pub candidate: Candidate,
	pub score: SignalScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
	High,
	Medium,
	Low,
}
impl ConfidenceBand {
	pub fn from_score(score: f64, bands: &Bands) -> Self {
		if score >= bands.high {
			Self::High
		} else if score >= bands.medium {
			Self::Medium
		} else {
			Self::Low
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
	pub rank: u32,
	pub candidate: Candidate,
	pub signal_score: SignalScore,
	pub reasoning: String,
	pub confidence_band: ConfidenceBand,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
	pub detection_ms: f64,
	pub filtering_ms: f64,
	pub scoring_ms: f64,
	pub fusion_ms: f64,
	pub total_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
	pub selection_id: Uuid,
	pub selected: RankedResult,
	pub ranked: Vec<RankedResult>,
	pub detected_domains: Vec<DetectedDomain>,
	pub timings: PhaseTimings,
	pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
	NoCandidates,
	BelowConfidenceThreshold,
}
impl RejectReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::NoCandidates => "no_candidates",
			Self::BelowConfidenceThreshold => "below_confidence_threshold",
		}
	}

	/// Caller-facing text. Rejections mean "rephrase", never "retry later".
	pub fn user_message(self) -> &'static str {
		match self {
			Self::NoCandidates =>
				"No eligible candidate covers this request. Try rephrasing or broadening it.",
			Self::BelowConfidenceThreshold =>
				"Nothing matched your request well enough. Try rephrasing it with more detail.",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOutcome {
	pub selection_id: Uuid,
	pub reason: RejectReason,
	pub detected_domains: Vec<DetectedDomain>,
	pub reasoning: String,
	pub best_score: Option<f64>,
	pub timings: PhaseTimings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectOutcome {
	Selected(SelectionOutcome),
	Rejected(RejectedOutcome),
}
impl SelectOutcome {
	pub fn selected(&self) -> Option<&SelectionOutcome> {
		match self {
			Self::Selected(outcome) => Some(outcome),
			Self::Rejected(_) => None,
		}
	}

	pub fn rejected(&self) -> Option<&RejectedOutcome> {
		match self {
			Self::Selected(_) => None,
			Self::Rejected(outcome) => Some(outcome),
		}
	}

	pub fn detected_domains(&self) -> &[DetectedDomain] {
		match self {
			Self::Selected(outcome) => &outcome.detected_domains,
			Self::Rejected(outcome) => &outcome.detected_domains,
		}
	}
}
