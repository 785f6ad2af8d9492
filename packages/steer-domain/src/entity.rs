//! Lightweight structured entity extraction and overlap matching.
//!
//! Query entities come from two rule families: category-tagged vocabularies and numeric
//! constraints of the form `<number> <unit>`. Candidates are matched against their stored
//! entities exactly, partially (containment), or semantically (same type, shared word).

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, text};
use steer_config::Entities;

pub const MEASUREMENT_ENTITY_TYPE: &str = "measurement";

const EXACT_CONFIDENCE: f64 = 1.0;
const PARTIAL_CONFIDENCE: f64 = 0.8;
const SEMANTIC_CONFIDENCE: f64 = 0.5;
const SEMANTIC_MIN_WORD_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
	pub entity_id: String,
	pub entity_type: String,
	pub entity_text: String,
}
impl Entity {
	pub fn new(entity_type: &str, entity_text: &str) -> Self {
		let entity_type = entity_type.trim().to_string();
		let entity_text = entity_text.trim().to_string();
		let entity_id = format!("{}:{}", entity_type, entity_text.to_lowercase());

		Self { entity_id, entity_type, entity_text }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
	Exact,
	Partial,
	Semantic,
}
impl MatchType {
	pub fn confidence(self) -> f64 {
		match self {
			Self::Exact => EXACT_CONFIDENCE,
			Self::Partial => PARTIAL_CONFIDENCE,
			Self::Semantic => SEMANTIC_CONFIDENCE,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedEntity {
	pub entity_id: String,
	pub entity_type: String,
	pub entity_text: String,
	pub match_type: MatchType,
	pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityOverlap {
	pub matched: Vec<MatchedEntity>,
	/// Sum of match confidences over the number of query entities.
	pub score: f64,
	/// Matched query entities over the number of query entities.
	pub fraction: f64,
}

#[derive(Debug, Clone)]
struct Vocabulary {
	entity_type: String,
	regex: Regex,
}

#[derive(Debug, Clone, Default)]
pub struct EntityExtractor {
	vocabularies: Vec<Vocabulary>,
	measurement: Option<Regex>,
}
impl EntityExtractor {
	pub fn new(cfg: &Entities) -> Result<Self> {
		let mut vocabularies = Vec::new();

		for (idx, vocabulary) in cfg.vocabularies.iter().enumerate() {
			let alternatives: Vec<String> = vocabulary
				.terms
				.iter()
				.map(|term| term.trim())
				.filter(|term| !term.is_empty())
				.map(bounded_term)
				.collect();

			if alternatives.is_empty() {
				continue;
			}

			let regex = compile(
				&format!("(?:{})", alternatives.join("|")),
				&format!("entities.vocabularies[{idx}]"),
			)?;

			vocabularies.push(Vocabulary { entity_type: vocabulary.entity_type.clone(), regex });
		}

		let measurement = if cfg.units.is_empty() {
			None
		} else {
			let units: Vec<String> = cfg.units.iter().map(|unit| regex::escape(unit.trim())).collect();

			Some(compile(
				&format!(r"\b(\d+(?:\.\d+)?)\s*({})\b", units.join("|")),
				"entities.units",
			)?)
		};

		Ok(Self { vocabularies, measurement })
	}

	/// Extracts unique entities in order of their position in the query.
	pub fn extract(&self, query: &str) -> Vec<Entity> {
		let mut found: Vec<(usize, Entity)> = Vec::new();

		for vocabulary in &self.vocabularies {
			for hit in vocabulary.regex.find_iter(query) {
				found.push((hit.start(), Entity::new(&vocabulary.entity_type, hit.as_str())));
			}
		}

		if let Some(measurement) = self.measurement.as_ref() {
			for caps in measurement.captures_iter(query) {
				let (Some(whole), Some(number), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
				else {
					continue;
				};
				let text = format!("{} {}", number.as_str(), unit.as_str().to_lowercase());

				found.push((whole.start(), Entity::new(MEASUREMENT_ENTITY_TYPE, &text)));
			}
		}

		found.sort_by(|left, right| left.0.cmp(&right.0));

		let mut out: Vec<Entity> = Vec::with_capacity(found.len());

		for (_, entity) in found {
			if !out.iter().any(|existing| existing.entity_id == entity.entity_id) {
				out.push(entity);
			}
		}

		out
	}
}

/// Matches each query entity against the best stored entity of one candidate.
pub fn match_entities(query: &[Entity], stored: &[Entity]) -> EntityOverlap {
	if query.is_empty() || stored.is_empty() {
		return EntityOverlap::default();
	}

	let mut matched = Vec::new();
	let mut confidence_sum = 0.0;

	for wanted in query {
		let best = stored
			.iter()
			.filter_map(|candidate| classify(wanted, candidate).map(|kind| (kind, candidate)))
			.max_by(|left, right| {
				left.0.confidence().partial_cmp(&right.0.confidence()).unwrap_or(std::cmp::Ordering::Equal)
			});
		let Some((match_type, entity)) = best else { continue };

		confidence_sum += match_type.confidence();
		matched.push(MatchedEntity {
			entity_id: entity.entity_id.clone(),
			entity_type: entity.entity_type.clone(),
			entity_text: entity.entity_text.clone(),
			match_type,
			confidence: match_type.confidence(),
		});
	}

	let total = query.len() as f64;

	EntityOverlap { fraction: matched.len() as f64 / total, score: confidence_sum / total, matched }
}

fn classify(wanted: &Entity, candidate: &Entity) -> Option<MatchType> {
	let left = wanted.entity_text.trim().to_lowercase();
	let right = candidate.entity_text.trim().to_lowercase();

	if left.is_empty() || right.is_empty() {
		return None;
	}
	if left == right {
		return Some(MatchType::Exact);
	}
	if left.contains(&right) || right.contains(&left) {
		return Some(MatchType::Partial);
	}
	if wanted.entity_type.eq_ignore_ascii_case(&candidate.entity_type)
		&& text::shares_word(&left, &right, SEMANTIC_MIN_WORD_LEN)
	{
		return Some(MatchType::Semantic);
	}

	None
}

fn bounded_term(term: &str) -> String {
	let escaped = regex::escape(term);
	let starts_word = term.chars().next().map(is_word_char).unwrap_or(false);
	let ends_word = term.chars().last().map(is_word_char).unwrap_or(false);

	format!(
		"{}{}{}",
		if starts_word { r"\b" } else { "" },
		escaped,
		if ends_word { r"\b" } else { "" }
	)
}

fn is_word_char(ch: char) -> bool {
	ch.is_alphanumeric() || ch == '_'
}

fn compile(pattern: &str, label: &str) -> Result<Regex> {
	RegexBuilder::new(pattern)
		.case_insensitive(true)
		.build()
		.map_err(|err| Error::InvalidPattern { label: label.to_string(), source: err })
}
