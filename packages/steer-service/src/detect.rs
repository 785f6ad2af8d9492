//! Domain detection: a synchronous pattern pass with an embedding-based fallback.

use std::sync::Arc;

use color_eyre::eyre;
use tokio::time::Instant;

use crate::{EmbeddingProvider, Result};
use steer_config::{Config, DomainProfile, EmbeddingProviderConfig};
use steer_domain::{
	detected::{self, DetectedDomain, DetectionMethod},
	pattern::PatternMatcher,
	similarity,
};

/// Ranks domain profiles by cosine similarity to the query embedding.
pub struct SemanticClassifier {
	embedding: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
	profiles: Vec<DomainProfile>,
	profile_texts: Vec<String>,
	min_similarity: f64,
}
impl SemanticClassifier {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		cfg: EmbeddingProviderConfig,
		profiles: Vec<DomainProfile>,
		min_similarity: f64,
	) -> Self {
		let profile_texts = profiles.iter().map(profile_text).collect();

		Self { embedding, cfg, profiles, profile_texts, min_similarity }
	}

	pub fn profile_count(&self) -> usize {
		self.profiles.len()
	}

	/// Embeds the query and every profile concurrently and keeps domains whose similarity is
	/// strictly above the configured floor. A blank query yields no domains without embedding.
	pub async fn classify(&self, query: &str) -> eyre::Result<Vec<DetectedDomain>> {
		let query = query.trim();

		if query.is_empty() || self.profiles.is_empty() {
			return Ok(Vec::new());
		}

		let query_texts = vec![query.to_string()];
		let (query_vectors, profile_vectors) = tokio::join!(
			self.embedding.embed(&self.cfg, &query_texts),
			self.embedding.embed(&self.cfg, &self.profile_texts),
		);
		let query_vector = query_vectors?
			.into_iter()
			.next()
			.ok_or_else(|| eyre::eyre!("Embedding provider returned no query vector."))?;
		let profile_vectors = profile_vectors?;

		if profile_vectors.len() != self.profiles.len() {
			return Err(eyre::eyre!(
				"Embedding provider returned {} profile vectors for {} domains.",
				profile_vectors.len(),
				self.profiles.len()
			));
		}

		let mut out: Vec<DetectedDomain> = self
			.profiles
			.iter()
			.zip(&profile_vectors)
			.filter_map(|(profile, vector)| {
				let score = similarity::cosine_similarity(&query_vector, vector);

				(score > self.min_similarity).then(|| DetectedDomain {
					domain: profile.name.clone(),
					confidence: score.clamp(0.0, detected::HYBRID_CAP),
					method: DetectionMethod::Semantic,
					priority: profile.priority,
					matched_terms: Vec::new(),
				})
			})
			.collect();

		out.sort_by(|left, right| {
			detected::cmp_f64_desc(left.confidence, right.confidence)
				.then_with(|| left.domain.cmp(&right.domain))
		});

		Ok(out)
	}
}

pub struct DomainDetector {
	patterns: PatternMatcher,
	semantic: Option<SemanticClassifier>,
	fast_path_confidence: f64,
}
impl DomainDetector {
	pub fn new(cfg: &Config, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
		let patterns = PatternMatcher::new(&cfg.rules)?;
		let semantic = cfg.providers.embedding.as_ref().map(|embedding_cfg| {
			SemanticClassifier::new(
				embedding,
				embedding_cfg.clone(),
				cfg.domains.clone(),
				cfg.detection.semantic_min_similarity,
			)
		});

		Ok(Self { patterns, semantic, fast_path_confidence: cfg.detection.fast_path_confidence })
	}

	pub fn has_semantic(&self) -> bool {
		self.semantic.is_some()
	}

	pub async fn detect(
		&self,
		query: &str,
		max_domains: usize,
		min_confidence: f64,
		allow_semantic: bool,
	) -> Vec<DetectedDomain> {
		self.detect_until(query, max_domains, min_confidence, allow_semantic, None).await
	}

	/// Never fails. Semantic errors and an elapsed `deadline` degrade to pattern-only results.
	pub async fn detect_until(
		&self,
		query: &str,
		max_domains: usize,
		min_confidence: f64,
		allow_semantic: bool,
		deadline: Option<Instant>,
	) -> Vec<DetectedDomain> {
		let pattern = self.patterns.detect(query);
		let top_pattern = pattern.iter().map(|item| item.confidence).fold(0.0_f64, f64::max);

		if detected::meets_threshold(top_pattern, self.fast_path_confidence) {
			tracing::debug!(
				top_confidence = top_pattern,
				domains = pattern.len(),
				"Pattern fast path taken."
			);

			return detected::finalize_detected(pattern, max_domains, min_confidence);
		}

		let semantic = match (allow_semantic, self.semantic.as_ref()) {
			(true, Some(classifier)) => self.run_semantic(classifier, query, deadline).await,
			(true, None) => {
				tracing::debug!("Semantic fallback skipped; no embedding provider is configured.");

				Vec::new()
			},
			(false, _) => Vec::new(),
		};

		detected::finalize_detected(
			detected::merge_detections(pattern, semantic),
			max_domains,
			min_confidence,
		)
	}

	async fn run_semantic(
		&self,
		classifier: &SemanticClassifier,
		query: &str,
		deadline: Option<Instant>,
	) -> Vec<DetectedDomain> {
		let result = match deadline {
			Some(deadline) => match tokio::time::timeout_at(deadline, classifier.classify(query)).await
			{
				Ok(result) => result,
				Err(_) => {
					tracing::warn!("Semantic domain detection cancelled at the deadline.");

					return Vec::new();
				},
			},
			None => classifier.classify(query).await,
		};

		match result {
			Ok(domains) => {
				tracing::debug!(
					profiles = classifier.profile_count(),
					matched = domains.len(),
					"Semantic domain detection finished."
				);

				domains
			},
			Err(err) => {
				tracing::warn!(error = %err, "Semantic domain detection failed.");

				Vec::new()
			},
		}
	}
}

fn profile_text(profile: &DomainProfile) -> String {
	let description = profile.description.trim();

	if description.is_empty() {
		profile.name.clone()
	} else {
		format!("{}\n{}", profile.name, description)
	}
}
