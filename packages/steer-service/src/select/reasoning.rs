//! Deterministic explanation strings. Same inputs, same text.

use crate::models::{RejectReason, ScoredCandidate, SignalScore};
use steer_domain::detected::DetectedDomain;

const MAX_REASONING_DOMAINS: usize = 3;
const MAX_RUNNERS_UP: usize = 2;

pub fn selection_reasoning(
	selected: &ScoredCandidate,
	runners_up: &[ScoredCandidate],
	domains: &[DetectedDomain],
) -> String {
	format!(
		"Selected \"{}\" with score {:.2} ({}). Domains: {}. Runners-up: {}.",
		selected.candidate.display_name(),
		selected.score.boosted,
		signal_breakdown(&selected.score),
		domain_list(domains),
		runner_list(runners_up),
	)
}

pub fn candidate_reasoning(rank: u32, scored: &ScoredCandidate) -> String {
	format!(
		"Ranked #{rank} \"{}\" with score {:.2} ({}).",
		scored.candidate.display_name(),
		scored.score.boosted,
		signal_breakdown(&scored.score),
	)
}

pub fn rejection_reasoning(
	reason: RejectReason,
	ranking: &[ScoredCandidate],
	domains: &[DetectedDomain],
	min_confidence: f64,
) -> String {
	match (reason, ranking.split_first()) {
		(RejectReason::NoCandidates, _) =>
			format!("No eligible candidates. Domains: {}.", domain_list(domains)),
		(RejectReason::BelowConfidenceThreshold, None) => format!(
			"No candidate produced a signal; minimum confidence is {min_confidence:.2}. Domains: {}.",
			domain_list(domains),
		),
		(RejectReason::BelowConfidenceThreshold, Some((best, rest))) => format!(
			"Best candidate \"{}\" scored {:.2}, below the minimum of {min_confidence:.2}. Domains: {}. Runners-up: {}.",
			best.candidate.display_name(),
			best.score.boosted,
			domain_list(domains),
			runner_list(rest),
		),
	}
}

pub fn signal_breakdown(score: &SignalScore) -> String {
	format!(
		"vector {}, keyword {}, entity {}, entity match {:.0}%",
		signal_value(score.vector),
		signal_value(score.keyword),
		signal_value(score.entity),
		score.entity_match_fraction * 100.0,
	)
}

fn signal_value(value: Option<f64>) -> String {
	value.map(|value| format!("{value:.2}")).unwrap_or_else(|| "-".to_string())
}

fn domain_list(domains: &[DetectedDomain]) -> String {
	if domains.is_empty() {
		return "none".to_string();
	}

	domains
		.iter()
		.take(MAX_REASONING_DOMAINS)
		.map(|domain| format!("{} ({:.2}, {})", domain.domain, domain.confidence, domain.method.as_str()))
		.collect::<Vec<_>>()
		.join(", ")
}

fn runner_list(runners_up: &[ScoredCandidate]) -> String {
	if runners_up.is_empty() {
		return "none".to_string();
	}

	runners_up
		.iter()
		.take(MAX_RUNNERS_UP)
		.map(|runner| format!("\"{}\" ({:.2})", runner.candidate.display_name(), runner.score.boosted))
		.collect::<Vec<_>>()
		.join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::{Candidate, CandidateStatus};
	use steer_domain::detected::DetectionMethod;

	fn scored(id: &str, boosted: f64, vector: Option<f64>) -> ScoredCandidate {
		ScoredCandidate {
			candidate: Candidate {
				id: id.to_string(),
				name: format!("Agent {id}"),
				domains: Vec::new(),
				tier: 1,
				priority: 0,
				status: CandidateStatus::Active,
				extra: Default::default(),
			},
			score: SignalScore {
				candidate_id: id.to_string(),
				vector,
				keyword: None,
				entity: None,
				combined: boosted,
				entity_match_fraction: 0.0,
				boosted,
				matched_entities: Vec::new(),
			},
		}
	}

	fn domain(name: &str) -> DetectedDomain {
		DetectedDomain {
			domain: name.to_string(),
			confidence: 0.8,
			method: DetectionMethod::Pattern,
			priority: 1,
			matched_terms: Vec::new(),
		}
	}

	#[test]
	fn selection_lists_top_domains_and_two_runners_up() {
		let domains = vec![domain("a"), domain("b"), domain("c"), domain("d")];
		let runners = vec![scored("2", 0.5, None), scored("3", 0.4, None), scored("4", 0.3, None)];
		let text = selection_reasoning(&scored("1", 0.91, Some(0.95)), &runners, &domains);

		assert_eq!(
			text,
			"Selected \"Agent 1\" with score 0.91 (vector 0.95, keyword -, entity -, entity match 0%). \
			 Domains: a (0.80, pattern), b (0.80, pattern), c (0.80, pattern). \
			 Runners-up: \"Agent 2\" (0.50), \"Agent 3\" (0.40)."
		);
	}

	#[test]
	fn rejection_names_the_best_score() {
		let ranking = vec![scored("1", 0.35, Some(0.875))];
		let text =
			rejection_reasoning(RejectReason::BelowConfidenceThreshold, &ranking, &[], 0.4);

		assert!(text.starts_with("Best candidate \"Agent 1\" scored 0.35, below the minimum of 0.40."));
		assert!(text.ends_with("Runners-up: none."));
	}

	#[test]
	fn blank_names_fall_back_to_ids() {
		let mut item = scored("agent-7", 0.5, None);

		item.candidate.name = String::new();

		assert!(candidate_reasoning(2, &item).starts_with("Ranked #2 \"agent-7\""));
	}
}
