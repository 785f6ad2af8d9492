//! The three independent signal scorers and their fan-out/fan-in join.

use std::future::Future;

use ahash::AHashMap;
use color_eyre::eyre;
use tokio::time::Instant;

use crate::{SteerService, select::fusion::SignalSet};
use steer_domain::entity::{self, Entity, EntityOverlap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
	Vector,
	Keyword,
	Entity,
}
impl SignalKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Keyword => "keyword",
			Self::Entity => "entity",
		}
	}
}

impl SteerService {
	/// Runs all scorers concurrently and waits for every one of them to settle.
	///
	/// A scorer that fails or misses `deadline` contributes an empty map and marks the set
	/// degraded.
	pub(crate) async fn score_signals(
		&self,
		query: &str,
		query_entities: &[Entity],
		deadline: Option<Instant>,
	) -> SignalSet {
		let (vector, keyword, entity) = tokio::join!(
			settle(SignalKind::Vector, deadline, self.score_vector(query)),
			settle(SignalKind::Keyword, deadline, self.score_keyword(query)),
			settle(SignalKind::Entity, deadline, self.score_entities(query_entities)),
		);

		let degraded = vector.is_none() || keyword.is_none() || entity.is_none();

		SignalSet {
			vector: vector.unwrap_or_default(),
			keyword: keyword.unwrap_or_default(),
			entity: entity.unwrap_or_default(),
			degraded,
		}
	}

	async fn score_vector(&self, query: &str) -> eyre::Result<AHashMap<String, f64>> {
		let (Some(index), Some(embedding_cfg)) =
			(self.sources.vectors.as_ref(), self.cfg.providers.embedding.as_ref())
		else {
			tracing::debug!("Vector signal skipped; index or embedding provider is absent.");

			return Ok(AHashMap::new());
		};
		let query = query.trim();

		if query.is_empty() {
			return Ok(AHashMap::new());
		}

		let texts = vec![query.to_string()];
		let vector = self
			.providers
			.embedding
			.embed(embedding_cfg, &texts)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| eyre::eyre!("Embedding provider returned no query vector."))?;
		let floor = self.cfg.scoring.vector_min_similarity;
		let mut out = AHashMap::new();

		for hit in index.nearest(&vector, self.cfg.scoring.vector_limit).await? {
			if !hit.similarity.is_finite() || hit.similarity < floor {
				continue;
			}

			keep_max(&mut out, hit.candidate_id, hit.similarity);
		}

		Ok(out)
	}

	async fn score_keyword(&self, query: &str) -> eyre::Result<AHashMap<String, f64>> {
		let Some(index) = self.sources.keywords.as_ref() else {
			tracing::debug!("Keyword signal skipped; no keyword index is configured.");

			return Ok(AHashMap::new());
		};
		let query = query.trim();

		if query.is_empty() {
			return Ok(AHashMap::new());
		}

		let default_weight = self.cfg.scoring.keyword_default_weight;
		let mut out = AHashMap::new();

		for hit in index.search(query, self.cfg.scoring.keyword_limit).await? {
			let relevance = match hit.rank {
				Some(rank) if rank.is_finite() => rank.clamp(0.0, 1.0),
				_ => default_weight,
			};

			keep_max(&mut out, hit.candidate_id, relevance);
		}

		Ok(out)
	}

	async fn score_entities(
		&self,
		query_entities: &[Entity],
	) -> eyre::Result<AHashMap<String, EntityOverlap>> {
		let Some(index) = self.sources.entities.as_ref() else {
			tracing::debug!("Entity signal skipped; no entity index is configured.");

			return Ok(AHashMap::new());
		};

		if query_entities.is_empty() {
			return Ok(AHashMap::new());
		}

		let texts: Vec<String> =
			query_entities.iter().map(|entity| entity.entity_text.clone()).collect();
		let mut types: Vec<String> =
			query_entities.iter().map(|entity| entity.entity_type.clone()).collect();

		types.sort();
		types.dedup();

		let mut out: AHashMap<String, EntityOverlap> = AHashMap::new();

		for hit in index.lookup_by_entities(&texts, &types, self.cfg.scoring.entity_limit).await? {
			let overlap = entity::match_entities(query_entities, &hit.stored_entities);

			if overlap.matched.is_empty() {
				continue;
			}

			match out.get(&hit.candidate_id) {
				Some(existing) if existing.score >= overlap.score => {},
				_ => {
					out.insert(hit.candidate_id, overlap);
				},
			}
		}

		Ok(out)
	}
}

/// `None` when the scorer failed or was cancelled at the deadline.
async fn settle<T, F>(kind: SignalKind, deadline: Option<Instant>, scorer: F) -> Option<T>
where
	F: Future<Output = eyre::Result<T>>,
{
	let result = match deadline {
		Some(deadline) => match tokio::time::timeout_at(deadline, scorer).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(signal = kind.as_str(), "Signal scorer cancelled at the deadline.");

				return None;
			},
		},
		None => scorer.await,
	};

	match result {
		Ok(value) => Some(value),
		Err(err) => {
			tracing::warn!(signal = kind.as_str(), error = %err, "Signal scorer failed.");

			None
		},
	}
}

fn keep_max(out: &mut AHashMap<String, f64>, candidate_id: String, score: f64) {
	let entry = out.entry(candidate_id).or_insert(score);

	if score > *entry {
		*entry = score;
	}
}
