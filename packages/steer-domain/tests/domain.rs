use steer_config::{Entities, EntityVocabulary, PatternRule};
use steer_domain::{
	detected::{self, DetectedDomain, DetectionMethod},
	entity::{self, EntityExtractor, MatchType},
	pattern::PatternMatcher,
	similarity,
};

fn rules() -> Vec<PatternRule> {
	vec![
		PatternRule {
			domains: vec!["regulatory_affairs".to_string()],
			pattern: r"\b(fda|510\(?k\)?|submission)\b".to_string(),
			priority: 1,
		},
		PatternRule {
			domains: vec!["clinical_research".to_string(), "regulatory_affairs".to_string()],
			pattern: r"\b(trial|endpoint)s?\b".to_string(),
			priority: 2,
		},
	]
}

#[test]
fn pattern_detection_is_idempotent() {
	let matcher = PatternMatcher::new(&rules()).expect("Rules must compile.");
	let query = "FDA submission for a pivotal trial";
	let first = detected::finalize_detected(matcher.detect(query), 5, 0.3);

	for _ in 0..5 {
		assert_eq!(detected::finalize_detected(matcher.detect(query), 5, 0.3), first);
	}
}

#[test]
fn regulatory_query_reaches_fast_path_confidence() {
	let matcher = PatternMatcher::new(&rules()).expect("Rules must compile.");
	let out = detected::finalize_detected(matcher.detect("FDA 510k submission timeline"), 5, 0.3);

	assert_eq!(out[0].domain, "regulatory_affairs");
	assert_eq!(out[0].method, DetectionMethod::Pattern);
	assert!(detected::meets_threshold(out[0].confidence, 0.8));
}

#[test]
fn merged_confidence_dominates_both_methods() {
	let matcher = PatternMatcher::new(&rules()).expect("Rules must compile.");
	let pattern = matcher.detect("pivotal trial endpoints");
	let pattern_confidence = pattern[0].confidence;
	let semantic = vec![DetectedDomain {
		domain: "clinical_research".to_string(),
		confidence: 0.55,
		method: DetectionMethod::Semantic,
		priority: 2,
		matched_terms: Vec::new(),
	}];
	let merged = detected::merge_detections(pattern, semantic);
	let clinical = merged
		.iter()
		.find(|item| item.domain == "clinical_research")
		.expect("Clinical research must be detected.");

	assert_eq!(clinical.method, DetectionMethod::Hybrid);
	assert!(clinical.confidence >= pattern_confidence);
	assert!(clinical.confidence >= 0.55);
	assert!(clinical.confidence <= detected::HYBRID_CAP);
	assert_eq!(clinical.matched_terms, vec!["trial", "endpoints"]);
}

#[test]
fn detected_domain_serializes_method_in_snake_case() {
	let value = serde_json::to_value(DetectedDomain {
		domain: "billing".to_string(),
		confidence: 0.6,
		method: DetectionMethod::Hybrid,
		priority: 1,
		matched_terms: vec!["invoice".to_string()],
	})
	.expect("Failed to serialize detected domain.");

	assert_eq!(value["method"], "hybrid");
	assert_eq!(value["matched_terms"][0], "invoice");
}

#[test]
fn extracted_entities_match_stored_entities() {
	let extractor = EntityExtractor::new(&Entities {
		vocabularies: vec![EntityVocabulary {
			entity_type: "regulatory_body".to_string(),
			terms: vec!["FDA".to_string()],
		}],
		units: vec!["mg".to_string()],
	})
	.expect("Entities must compile.");
	let query = extractor.extract("FDA labeling for 5 mg tablets");
	let stored = vec![entity::Entity::new("regulatory_body", "fda")];
	let overlap = entity::match_entities(&query, &stored);

	assert_eq!(query.len(), 2);
	assert_eq!(overlap.matched.len(), 1);
	assert_eq!(overlap.matched[0].match_type, MatchType::Exact);
	assert!((overlap.fraction - 0.5).abs() < 1e-12);
}

#[test]
fn cosine_of_scaled_vectors_is_one() {
	let value = similarity::cosine_similarity(&[0.5, 1.0], &[1.0, 2.0]);

	assert!((value - 1.0).abs() < 1e-9);
}
