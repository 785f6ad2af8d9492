use ahash::AHashMap;

use crate::models::{Candidate, ScoredCandidate, SignalScore};
use steer_config::Fusion;
use steer_domain::{detected, entity::EntityOverlap};

/// Settled scorer outputs keyed by candidate id. A missing key means the scorer had nothing.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
	pub vector: AHashMap<String, f64>,
	pub keyword: AHashMap<String, f64>,
	pub entity: AHashMap<String, EntityOverlap>,
	/// Set when at least one scorer failed or missed the deadline.
	pub degraded: bool,
}
impl SignalSet {
	pub fn is_empty(&self) -> bool {
		self.vector.is_empty() && self.keyword.is_empty() && self.entity.is_empty()
	}

	pub fn contains(&self, candidate_id: &str) -> bool {
		self.vector.contains_key(candidate_id)
			|| self.keyword.contains_key(candidate_id)
			|| self.entity.contains_key(candidate_id)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionEngine {
	pub vector_weight: f64,
	pub keyword_weight: f64,
	pub entity_weight: f64,
	pub entity_boost: f64,
}
impl FusionEngine {
	pub fn new(cfg: &Fusion) -> Self {
		Self {
			vector_weight: cfg.vector_weight,
			keyword_weight: cfg.keyword_weight,
			entity_weight: cfg.entity_weight,
			entity_boost: cfg.entity_boost,
		}
	}

	/// Weighted sum. Absent signals contribute zero.
	pub fn combine(&self, vector: Option<f64>, keyword: Option<f64>, entity: Option<f64>) -> f64 {
		vector.unwrap_or(0.0) * self.vector_weight
			+ keyword.unwrap_or(0.0) * self.keyword_weight
			+ entity.unwrap_or(0.0) * self.entity_weight
	}

	pub fn boost(&self, combined: f64, entity_match_fraction: f64) -> f64 {
		combined * (1.0 + self.entity_boost * entity_match_fraction)
	}

	/// Scores every candidate that at least one signal returned, then sorts by the boosted score.
	///
	/// `candidates` must be in repository order; the sort is stable so equal boosted scores keep
	/// that order. Signal entries for ids outside `candidates` are ignored.
	pub fn fuse(&self, candidates: &[Candidate], signals: &SignalSet) -> Vec<ScoredCandidate> {
		let mut out: Vec<ScoredCandidate> = candidates
			.iter()
			.filter(|candidate| signals.contains(&candidate.id))
			.map(|candidate| ScoredCandidate {
				candidate: candidate.clone(),
				score: self.score(&candidate.id, signals),
			})
			.collect();

		out.sort_by(|left, right| detected::cmp_f64_desc(left.score.boosted, right.score.boosted));

		out
	}

	fn score(&self, candidate_id: &str, signals: &SignalSet) -> SignalScore {
		let vector = signals.vector.get(candidate_id).copied();
		let keyword = signals.keyword.get(candidate_id).copied();
		let overlap = signals.entity.get(candidate_id);
		let entity = overlap.map(|overlap| overlap.score);
		let entity_match_fraction = overlap.map(|overlap| overlap.fraction).unwrap_or(0.0);
		let combined = self.combine(vector, keyword, entity);

		SignalScore {
			candidate_id: candidate_id.to_string(),
			vector,
			keyword,
			entity,
			combined,
			entity_match_fraction,
			boosted: self.boost(combined, entity_match_fraction),
			matched_entities: overlap.map(|overlap| overlap.matched.clone()).unwrap_or_default(),
		}
	}
}
