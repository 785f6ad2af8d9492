//! Detected domains and the confidence arithmetic shared by the pattern and semantic paths.

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

/// Confidence of a fresh pattern match before counting matches.
pub const PATTERN_BASE_CONFIDENCE: f64 = 0.5;
/// Confidence added per match, per confirming rule, and per method agreement.
pub const CONFIDENCE_STEP: f64 = 0.1;
/// Cap for a domain first seen by a pattern rule.
pub const PATTERN_INSERT_CAP: f64 = 0.9;
/// Cap for a domain confirmed by more than one pattern rule.
pub const PATTERN_BOOST_CAP: f64 = 0.95;
/// Cap for a domain confirmed by both the pattern and the semantic method.
pub const HYBRID_CAP: f64 = 0.98;
/// Slack for threshold comparisons on accumulated floating point confidences.
pub const CONFIDENCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
	Pattern,
	Semantic,
	Hybrid,
}
impl DetectionMethod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pattern => "pattern",
			Self::Semantic => "semantic",
			Self::Hybrid => "hybrid",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedDomain {
	pub domain: String,
	pub confidence: f64,
	pub method: DetectionMethod,
	pub priority: i32,
	pub matched_terms: Vec<String>,
}

pub fn meets_threshold(value: f64, threshold: f64) -> bool {
	value + CONFIDENCE_EPSILON >= threshold
}

pub fn pattern_confidence(match_count: usize) -> f64 {
	(PATTERN_BASE_CONFIDENCE + CONFIDENCE_STEP * match_count as f64).min(PATTERN_INSERT_CAP)
}

pub fn boost_confidence(confidence: f64, cap: f64) -> f64 {
	(confidence + CONFIDENCE_STEP).min(cap)
}

/// Merges semantic detections into pattern detections.
///
/// Pattern entries win on key collisions. A domain found by both methods becomes `Hybrid` and its
/// confidence is boosted from the stronger of the two, so agreement never lowers confidence.
pub fn merge_detections(
	pattern: Vec<DetectedDomain>,
	semantic: Vec<DetectedDomain>,
) -> Vec<DetectedDomain> {
	let mut out = pattern;
	let mut index: HashMap<String, usize> =
		out.iter().enumerate().map(|(idx, item)| (item.domain.clone(), idx)).collect();

	for item in semantic {
		match index.get(&item.domain) {
			Some(&idx) => {
				let existing = &mut out[idx];
				let strongest = existing.confidence.max(item.confidence);

				existing.confidence = boost_confidence(strongest, HYBRID_CAP);
				existing.method = DetectionMethod::Hybrid;
			},
			None => {
				index.insert(item.domain.clone(), out.len());
				out.push(item);
			},
		}
	}

	out
}

/// Sorts by priority ascending, then confidence descending, then name for a stable total order.
pub fn sort_detected(domains: &mut [DetectedDomain]) {
	domains.sort_by(|left, right| {
		left.priority
			.cmp(&right.priority)
			.then_with(|| cmp_f64_desc(left.confidence, right.confidence))
			.then_with(|| left.domain.cmp(&right.domain))
	});
}

/// Orders, truncates to `max_domains`, then drops entries under `min_confidence`.
pub fn finalize_detected(
	mut domains: Vec<DetectedDomain>,
	max_domains: usize,
	min_confidence: f64,
) -> Vec<DetectedDomain> {
	sort_detected(&mut domains);
	domains.truncate(max_domains);
	domains.retain(|item| meets_threshold(item.confidence, min_confidence));

	domains
}

pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
