//! In-memory candidate catalog backing every lookup interface of the selection service.
//!
//! The catalog file is JSON of the form `{ "candidates": [ ... ] }`. Each record is a candidate
//! plus optional `content` (keyword text), `embedding` (vector), and `entities` entries.

mod error;

pub use error::{Error, Result};

use std::{collections::HashSet, fs, path::Path, sync::Arc};

use color_eyre::eyre;
use serde::Deserialize;
use serde_json::{Map, Value};

use steer_domain::{detected, entity::Entity, similarity, text};
use steer_service::{
	BoxFuture, Candidate, CandidateRepository, CandidateStatus, EntityHit, EntityIndex, KeywordHit,
	KeywordIndex, Sources, VectorHit, VectorIndex,
};

const KEYWORD_MIN_TERM_LEN: usize = 2;
const KEYWORD_MAX_QUERY_TERMS: usize = 32;
const KEYWORD_MAX_TEXT_TERMS: usize = 4_096;

#[derive(Debug, Deserialize)]
struct CatalogFile {
	candidates: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct StoredEntity {
	entity_type: String,
	entity_text: String,
}

#[derive(Debug, Clone)]
struct CatalogRecord {
	candidate: Candidate,
	content: String,
	embedding: Option<Vec<f32>>,
	entities: Vec<Entity>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
	records: Vec<CatalogRecord>,
}
impl MemoryCatalog {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::ReadCatalog { path: path.to_path_buf(), source: err })?;

		Self::from_json(&raw)
	}

	pub fn from_json(raw: &str) -> Result<Self> {
		let file: CatalogFile =
			serde_json::from_str(raw).map_err(|err| Error::ParseCatalog { source: err })?;
		let mut records = Vec::with_capacity(file.candidates.len());
		let mut seen = HashSet::new();

		for (idx, entry) in file.candidates.into_iter().enumerate() {
			let record = parse_record(idx, entry)?;

			if !seen.insert(record.candidate.id.clone()) {
				return Err(Error::Validation {
					message: format!(
						"candidates[{idx}].id {:?} is a duplicate.",
						record.candidate.id
					),
				});
			}

			records.push(record);
		}

		tracing::debug!(candidates = records.len(), "Catalog loaded.");

		Ok(Self { records })
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
		self.records.iter().map(|record| &record.candidate)
	}

	/// Wires this catalog in as the repository and all three indexes.
	pub fn into_sources(self: Arc<Self>) -> Sources {
		Sources::new(self.clone())
			.with_vectors(self.clone())
			.with_keywords(self.clone())
			.with_entities(self)
	}

	fn eligible(
		&self,
		domain_filter: Option<&[String]>,
		tier_ceiling: u32,
		limit: u32,
	) -> Vec<Candidate> {
		let mut out: Vec<&Candidate> = self
			.candidates()
			.filter(|candidate| candidate.status == CandidateStatus::Active)
			.filter(|candidate| candidate.tier <= tier_ceiling)
			.filter(|candidate| match domain_filter {
				Some(domains) => candidate.domains.iter().any(|domain| domains.contains(domain)),
				None => true,
			})
			.collect();

		out.sort_by(|left, right| {
			left.tier.cmp(&right.tier).then_with(|| right.priority.cmp(&left.priority))
		});

		out.into_iter().take(limit as usize).cloned().collect()
	}

	fn keyword_hits(&self, query: &str, limit: u32) -> Vec<KeywordHit> {
		let terms = text::tokenize_terms(query, KEYWORD_MIN_TERM_LEN, KEYWORD_MAX_QUERY_TERMS);

		if terms.is_empty() {
			return Vec::new();
		}

		let mut hits: Vec<KeywordHit> = self
			.records
			.iter()
			.filter_map(|record| {
				let haystack = format!("{}\n{}", record.candidate.name, record.content);
				let ratio = text::term_overlap_ratio(&terms, &haystack, KEYWORD_MAX_TEXT_TERMS);

				(ratio > 0.0).then(|| KeywordHit {
					candidate_id: record.candidate.id.clone(),
					content: record.content.clone(),
					rank: Some(ratio),
				})
			})
			.collect();

		hits.sort_by(|left, right| {
			detected::cmp_f64_desc(left.rank.unwrap_or(0.0), right.rank.unwrap_or(0.0))
		});
		hits.truncate(limit as usize);

		hits
	}

	fn vector_hits(&self, vector: &[f32], limit: u32) -> Vec<VectorHit> {
		let mut hits: Vec<VectorHit> = self
			.records
			.iter()
			.filter_map(|record| {
				let embedding = record.embedding.as_ref()?;

				Some(VectorHit {
					candidate_id: record.candidate.id.clone(),
					similarity: similarity::cosine_similarity(vector, embedding),
				})
			})
			.collect();

		hits.sort_by(|left, right| detected::cmp_f64_desc(left.similarity, right.similarity));
		hits.truncate(limit as usize);

		hits
	}

	/// Active records sharing an entity text or type with the query, text overlap ranked first.
	fn entity_hits(&self, texts: &[String], types: &[String], limit: u32) -> Vec<EntityHit> {
		let texts: Vec<String> = texts.iter().map(|text| text.trim().to_lowercase()).collect();
		let mut ranked: Vec<(usize, usize, &CatalogRecord)> = self
			.records
			.iter()
			.filter(|record| record.candidate.status == CandidateStatus::Active)
			.filter_map(|record| {
				let text_matches = record
					.entities
					.iter()
					.filter(|entity| texts.contains(&entity.entity_text.to_lowercase()))
					.count();
				let type_matches = record
					.entities
					.iter()
					.filter(|entity| {
						types.iter().any(|kind| kind.eq_ignore_ascii_case(&entity.entity_type))
					})
					.count();

				(text_matches > 0 || type_matches > 0).then_some((text_matches, type_matches, record))
			})
			.collect();

		ranked.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| right.1.cmp(&left.1)));

		ranked
			.into_iter()
			.take(limit as usize)
			.map(|(_, _, record)| EntityHit {
				candidate_id: record.candidate.id.clone(),
				stored_entities: record.entities.clone(),
			})
			.collect()
	}
}
impl CandidateRepository for MemoryCatalog {
	fn query<'a>(
		&'a self,
		domain_filter: Option<&'a [String]>,
		tier_ceiling: u32,
		limit: u32,
	) -> BoxFuture<'a, eyre::Result<Vec<Candidate>>> {
		Box::pin(async move { Ok(self.eligible(domain_filter, tier_ceiling, limit)) })
	}
}
impl KeywordIndex for MemoryCatalog {
	fn search<'a>(
		&'a self,
		text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, eyre::Result<Vec<KeywordHit>>> {
		Box::pin(async move { Ok(self.keyword_hits(text, limit)) })
	}
}
impl VectorIndex for MemoryCatalog {
	fn nearest<'a>(
		&'a self,
		vector: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, eyre::Result<Vec<VectorHit>>> {
		Box::pin(async move { Ok(self.vector_hits(vector, limit)) })
	}
}
impl EntityIndex for MemoryCatalog {
	fn lookup_by_entities<'a>(
		&'a self,
		entity_texts: &'a [String],
		entity_types: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, eyre::Result<Vec<EntityHit>>> {
		Box::pin(async move { Ok(self.entity_hits(entity_texts, entity_types, limit)) })
	}
}

fn parse_record(idx: usize, mut entry: Map<String, Value>) -> Result<CatalogRecord> {
	let content = match entry.remove("content") {
		Some(Value::String(content)) => content,
		Some(Value::Null) | None => String::new(),
		Some(_) =>
			return Err(Error::Validation {
				message: format!("candidates[{idx}].content must be a string."),
			}),
	};
	let embedding = match entry.remove("embedding") {
		Some(Value::Null) | None => None,
		Some(value) => {
			let embedding: Vec<f32> = serde_json::from_value(value).map_err(|err| {
				Error::Validation { message: format!("candidates[{idx}].embedding is invalid: {err}") }
			})?;

			if embedding.is_empty() || embedding.iter().any(|value| !value.is_finite()) {
				return Err(Error::Validation {
					message: format!(
						"candidates[{idx}].embedding must be a non-empty list of finite numbers."
					),
				});
			}

			Some(embedding)
		},
	};
	let entities = match entry.remove("entities") {
		Some(Value::Null) | None => Vec::new(),
		Some(value) => {
			let stored: Vec<StoredEntity> = serde_json::from_value(value).map_err(|err| {
				Error::Validation { message: format!("candidates[{idx}].entities is invalid: {err}") }
			})?;

			stored
				.iter()
				.map(|entity| Entity::new(&entity.entity_type, &entity.entity_text))
				.collect()
		},
	};
	let candidate: Candidate = serde_json::from_value(Value::Object(entry))
		.map_err(|err| Error::Validation { message: format!("candidates[{idx}] is invalid: {err}") })?;

	if candidate.id.trim().is_empty() {
		return Err(Error::Validation { message: format!("candidates[{idx}].id must be non-empty.") });
	}

	Ok(CatalogRecord { candidate, content, embedding, entities })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_fields_stay_on_the_candidate() {
		let catalog = MemoryCatalog::from_json(
			r#"{ "candidates": [
				{ "id": "a", "tier": 1, "content": "Gold loans.", "owner": "ops" }
			] }"#,
		)
		.expect("Catalog must parse.");
		let candidate = catalog.candidates().next().expect("Expected a candidate.");

		assert_eq!(candidate.extra.get("owner"), Some(&Value::from("ops")));
		assert!(candidate.extra.get("content").is_none());
	}

	#[test]
	fn blank_ids_are_rejected() {
		let err = MemoryCatalog::from_json(r#"{ "candidates": [ { "id": " ", "tier": 1 } ] }"#)
			.expect_err("Expected validation error.");

		assert!(err.to_string().contains("candidates[0].id"), "Unexpected error: {err}");
	}

	#[test]
	fn text_matches_outrank_type_only_matches() {
		let mut candidates: Vec<String> = (0..25)
			.map(|idx| {
				format!(
					r#"{{ "id": "ema-{idx}", "tier": 1, "entities": [ {{ "entity_type": "regulatory_body", "entity_text": "EMA" }} ] }}"#
				)
			})
			.collect();

		candidates.push(
			r#"{ "id": "fda-retired", "tier": 1, "status": "inactive", "entities": [ { "entity_type": "regulatory_body", "entity_text": "FDA" } ] }"#
				.to_string(),
		);
		candidates.push(
			r#"{ "id": "fda", "tier": 1, "entities": [ { "entity_type": "regulatory_body", "entity_text": "FDA" } ] }"#
				.to_string(),
		);

		let catalog =
			MemoryCatalog::from_json(&format!(r#"{{ "candidates": [ {} ] }}"#, candidates.join(",")))
				.expect("Catalog must parse.");
		let hits = catalog.entity_hits(&["FDA".to_string()], &["regulatory_body".to_string()], 20);

		assert_eq!(hits.len(), 20);
		assert_eq!(hits[0].candidate_id, "fda");
		assert!(hits.iter().all(|hit| hit.candidate_id != "fda-retired"));
		assert_eq!(hits[1].candidate_id, "ema-0");
	}

	#[test]
	fn unknown_status_is_rejected() {
		let err = MemoryCatalog::from_json(
			r#"{ "candidates": [ { "id": "a", "tier": 1, "status": "archived" } ] }"#,
		)
		.expect_err("Expected validation error.");

		assert!(err.to_string().contains("candidates[0]"), "Unexpected error: {err}");
	}
}
