//! Fast lexical domain classification from ordered regex rules.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::{
	Error, Result,
	detected::{self, DetectedDomain, DetectionMethod, PATTERN_BOOST_CAP},
};
use steer_config::PatternRule;

#[derive(Debug, Clone)]
struct CompiledRule {
	domains: Vec<String>,
	regex: Regex,
	priority: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
	rules: Vec<CompiledRule>,
}
impl PatternMatcher {
	pub fn new(rules: &[PatternRule]) -> Result<Self> {
		let mut compiled = Vec::with_capacity(rules.len());

		for (idx, rule) in rules.iter().enumerate() {
			let regex = RegexBuilder::new(&rule.pattern)
				.case_insensitive(true)
				.build()
				.map_err(|err| Error::InvalidPattern { label: format!("rules[{idx}]"), source: err })?;

			compiled.push(CompiledRule {
				domains: rule.domains.clone(),
				regex,
				priority: rule.priority,
			});
		}

		Ok(Self { rules: compiled })
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Evaluates every rule in order. Results keep first-detection order.
	///
	/// A domain first matched by a rule starts at `0.5 + 0.1 * matches` (capped at 0.9). Each later
	/// rule that also names it adds 0.1 (capped at 0.95) and contributes its matched terms.
	pub fn detect(&self, query: &str) -> Vec<DetectedDomain> {
		let mut out: Vec<DetectedDomain> = Vec::new();
		let mut index: HashMap<String, usize> = HashMap::new();

		for rule in &self.rules {
			let terms = matched_terms(&rule.regex, query);

			if terms.count == 0 {
				continue;
			}

			for domain in &rule.domains {
				match index.get(domain) {
					Some(&idx) => {
						let existing = &mut out[idx];

						existing.confidence =
							detected::boost_confidence(existing.confidence, PATTERN_BOOST_CAP);

						for term in &terms.unique {
							if !existing.matched_terms.contains(term) {
								existing.matched_terms.push(term.clone());
							}
						}
					},
					None => {
						index.insert(domain.clone(), out.len());
						out.push(DetectedDomain {
							domain: domain.clone(),
							confidence: detected::pattern_confidence(terms.count),
							method: DetectionMethod::Pattern,
							priority: rule.priority,
							matched_terms: terms.unique.clone(),
						});
					},
				}
			}
		}

		out
	}
}

struct RuleMatches {
	count: usize,
	unique: Vec<String>,
}

fn matched_terms(regex: &Regex, query: &str) -> RuleMatches {
	let mut count = 0;
	let mut unique = Vec::new();

	for found in regex.find_iter(query) {
		let term = found.as_str().trim().to_lowercase();

		if term.is_empty() {
			continue;
		}

		count += 1;

		if !unique.contains(&term) {
			unique.push(term);
		}
	}

	RuleMatches { count, unique }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rule(domains: &[&str], pattern: &str, priority: i32) -> PatternRule {
		PatternRule {
			domains: domains.iter().map(|domain| domain.to_string()).collect(),
			pattern: pattern.to_string(),
			priority,
		}
	}

	#[test]
	fn counts_every_match_of_a_rule() {
		let matcher =
			PatternMatcher::new(&[rule(&["regulatory_affairs"], r"\b(fda|510k|submission)\b", 1)])
				.expect("Rules must compile.");
		let out = matcher.detect("FDA 510k submission timeline");

		assert_eq!(out.len(), 1);
		assert!(detected::meets_threshold(out[0].confidence, 0.8));
		assert_eq!(out[0].matched_terms, vec!["fda", "510k", "submission"]);
		assert_eq!(out[0].method, DetectionMethod::Pattern);
	}

	#[test]
	fn later_rules_boost_existing_domains() {
		let matcher = PatternMatcher::new(&[
			rule(&["billing"], r"\binvoice\b", 2),
			rule(&["billing", "support"], r"\brefund\b", 3),
		])
		.expect("Rules must compile.");
		let out = matcher.detect("refund my invoice");

		assert_eq!(out.len(), 2);
		assert_eq!(out[0].domain, "billing");
		assert!((out[0].confidence - 0.7).abs() < 1e-9);
		assert_eq!(out[0].priority, 2);
		assert_eq!(out[0].matched_terms, vec!["invoice", "refund"]);
		assert_eq!(out[1].domain, "support");
		assert!((out[1].confidence - 0.6).abs() < 1e-9);
	}

	#[test]
	fn boost_is_capped() {
		let rules: Vec<PatternRule> =
			(0..10).map(|idx| rule(&["billing"], r"\binvoice\b", idx)).collect();
		let matcher = PatternMatcher::new(&rules).expect("Rules must compile.");
		let out = matcher.detect("invoice");

		assert_eq!(out[0].confidence, PATTERN_BOOST_CAP);
	}

	#[test]
	fn empty_query_matches_nothing() {
		let matcher =
			PatternMatcher::new(&[rule(&["billing"], r"\binvoice\b", 1)]).expect("Rules must compile.");

		assert!(matcher.detect("").is_empty());
	}

	#[test]
	fn invalid_pattern_names_the_rule() {
		let err = PatternMatcher::new(&[rule(&["billing"], r"(unclosed", 1)])
			.expect_err("Expected compile error.");

		assert!(err.to_string().contains("rules[0]"), "Unexpected error: {err}");
	}
}
