pub mod fusion;

mod reasoning;
mod scoring;

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
	Error, Result, SteerService, cache,
	models::{
		Candidate, CandidateStatus, ConfidenceBand, PhaseTimings, RankedResult, RejectReason,
		RejectedOutcome, ScoredCandidate, SelectOutcome, SelectionOutcome,
	},
};
use steer_config::Selection;
use steer_domain::detected::{self, DetectedDomain};

/// Per-call overrides. Unset fields fall back to the `[selection]` config section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectOptions {
	pub max_candidates: Option<i64>,
	pub max_tier: Option<i64>,
	pub min_confidence: Option<f64>,
	pub domain_confidence_floor: Option<f64>,
	pub use_semantic_fallback: Option<bool>,
	pub max_domains: Option<i64>,
	/// Cancellation deadline measured from the start of `select`.
	pub timeout_ms: Option<i64>,
}
impl SelectOptions {
	pub fn resolve(&self, cfg: &Selection, query: &str) -> Result<ResolvedOptions> {
		let max_candidates = self.max_candidates.unwrap_or(i64::from(cfg.max_candidates));

		if max_candidates < 1 || max_candidates > i64::from(cfg.max_candidates_limit) {
			return Err(invalid(format!(
				"max_candidates must be between 1 and {}; got {max_candidates}.",
				cfg.max_candidates_limit
			)));
		}

		let max_tier = self.max_tier.unwrap_or(i64::from(cfg.max_tier));

		if max_tier < 1 || max_tier > i64::from(u32::MAX) {
			return Err(invalid(format!("max_tier must be a positive integer; got {max_tier}.")));
		}

		let min_confidence = self.min_confidence.unwrap_or(cfg.min_confidence);

		check_unit_interval("min_confidence", min_confidence)?;

		let domain_confidence_floor =
			self.domain_confidence_floor.unwrap_or(cfg.domain_confidence_floor);

		check_unit_interval("domain_confidence_floor", domain_confidence_floor)?;

		let max_domains = self.max_domains.unwrap_or(i64::from(cfg.max_domains));

		if max_domains < 1 {
			return Err(invalid(format!("max_domains must be at least 1; got {max_domains}.")));
		}

		let timeout = match self.timeout_ms {
			Some(timeout_ms) if timeout_ms <= 0 =>
				return Err(invalid(format!("timeout_ms must be greater than zero; got {timeout_ms}."))),
			Some(timeout_ms) => Some(Duration::from_millis(timeout_ms as u64)),
			None => None,
		};
		let query_chars = query.chars().count();

		if query_chars > cfg.max_query_chars as usize {
			return Err(invalid(format!(
				"query must be at most {} characters; got {query_chars}.",
				cfg.max_query_chars
			)));
		}

		Ok(ResolvedOptions {
			max_candidates: max_candidates as u32,
			max_tier: max_tier as u32,
			min_confidence,
			domain_confidence_floor,
			use_semantic_fallback: self.use_semantic_fallback.unwrap_or(cfg.use_semantic_fallback),
			max_domains: max_domains as usize,
			timeout,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
	pub max_candidates: u32,
	pub max_tier: u32,
	pub min_confidence: f64,
	pub domain_confidence_floor: f64,
	pub use_semantic_fallback: bool,
	pub max_domains: usize,
	pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	DetectingDomains,
	FilteringCandidates,
	Scoring,
	Fusing,
	Gating,
}
impl Phase {
	fn as_str(self) -> &'static str {
		match self {
			Self::DetectingDomains => "detecting_domains",
			Self::FilteringCandidates => "filtering_candidates",
			Self::Scoring => "scoring",
			Self::Fusing => "fusing",
			Self::Gating => "gating",
		}
	}
}

struct SelectionRun<'a> {
	id: Uuid,
	query: &'a str,
	options: ResolvedOptions,
	started: Instant,
	deadline: Option<Instant>,
	timings: PhaseTimings,
}
impl SelectionRun<'_> {
	fn enter(&self, phase: Phase) {
		tracing::debug!(
			selection_id = %self.id,
			phase = phase.as_str(),
			elapsed_ms = elapsed_ms(self.started),
			"Selection phase entered."
		);
	}
}

impl SteerService {
	/// Routes `query` to the best-fitting candidate.
	///
	/// Rejections are ordinary outcomes. Only invalid options and repository failures are errors.
	pub async fn select(&self, query: &str, options: SelectOptions) -> Result<SelectOutcome> {
		let options = options.resolve(&self.cfg.selection, query)?;
		let started = Instant::now();
		let mut run = SelectionRun {
			id: Uuid::new_v4(),
			query,
			deadline: options.timeout.map(|timeout| started + timeout),
			options,
			started,
			timings: PhaseTimings::default(),
		};

		run.enter(Phase::DetectingDomains);

		let phase_started = Instant::now();
		let detected = self
			.detector
			.detect_until(
				query,
				run.options.max_domains,
				run.options.domain_confidence_floor,
				run.options.use_semantic_fallback,
				run.deadline,
			)
			.await;

		run.timings.detection_ms = elapsed_ms(phase_started);
		self.check_phase_budget(&run, Phase::DetectingDomains, run.timings.detection_ms);

		let domains: Vec<String> = detected.iter().map(|item| item.domain.clone()).collect();
		let cache_key = self.ranking_cache_key(&run, &domains);
		let cached = match cache_key.as_deref() {
			Some(key) => self.read_cached_ranking(key).await,
			None => None,
		};
		let (ranking, from_cache) = match cached {
			Some(ranking) => (ranking, true),
			None => {
				run.enter(Phase::FilteringCandidates);

				let phase_started = Instant::now();
				let candidates = self.fetch_candidates(&run, &domains).await?;

				run.timings.filtering_ms = elapsed_ms(phase_started);
				self.check_phase_budget(&run, Phase::FilteringCandidates, run.timings.filtering_ms);

				if candidates.is_empty() {
					return Ok(self.reject(run, RejectReason::NoCandidates, &[], detected));
				}

				run.enter(Phase::Scoring);

				let phase_started = Instant::now();
				let query_entities = self.entities.extract(query);
				let signals = self.score_signals(query, &query_entities, run.deadline).await;

				run.timings.scoring_ms = elapsed_ms(phase_started);

				tracing::debug!(
					selection_id = %run.id,
					candidates = candidates.len(),
					query_entities = query_entities.len(),
					vector_hits = signals.vector.len(),
					keyword_hits = signals.keyword.len(),
					entity_hits = signals.entity.len(),
					"Signals settled."
				);

				run.enter(Phase::Fusing);

				let phase_started = Instant::now();
				let ranking = self.fusion.fuse(&candidates, &signals);

				run.timings.fusion_ms = elapsed_ms(phase_started);
				self.check_phase_budget(
					&run,
					Phase::Scoring,
					run.timings.scoring_ms + run.timings.fusion_ms,
				);

				if let Some(key) = cache_key.as_deref() {
					if signals.degraded {
						tracing::debug!(
							selection_id = %run.id,
							"Ranking cache write skipped; a signal scorer did not settle cleanly."
						);
					} else if !ranking.is_empty() {
						self.write_cached_ranking(key, &ranking).await;
					}
				}

				(ranking, false)
			},
		};

		run.enter(Phase::Gating);

		let passes = ranking
			.first()
			.map(|top| detected::meets_threshold(top.score.boosted, run.options.min_confidence))
			.unwrap_or(false);

		if !passes {
			return Ok(self.reject(run, RejectReason::BelowConfidenceThreshold, &ranking, detected));
		}

		Ok(self.accept(run, ranking, detected, from_cache))
	}

	/// Domain-filtered query first; one unfiltered retry when it yields nothing.
	///
	/// Without detected domains the unfiltered query is the only call.
	async fn fetch_candidates(
		&self,
		run: &SelectionRun<'_>,
		domains: &[String],
	) -> Result<Vec<Candidate>> {
		let repository = &self.sources.repository;
		let tier_ceiling = run.options.max_tier;
		let limit = run.options.max_candidates;

		if !domains.is_empty() {
			let primary = repository
				.query(Some(domains), tier_ceiling, limit)
				.await
				.map_err(|err| Error::Repository { message: format!("{err:#}") })?;
			let primary = admit_candidates(primary, tier_ceiling, limit);

			if !primary.is_empty() {
				return Ok(primary);
			}

			tracing::debug!(
				selection_id = %run.id,
				domains = domains.len(),
				"Domain-filtered query returned no candidates; retrying unfiltered."
			);
		}

		let fallback = repository
			.query(None, tier_ceiling, limit)
			.await
			.map_err(|err| Error::Repository { message: format!("{err:#}") })?;

		Ok(admit_candidates(fallback, tier_ceiling, limit))
	}

	fn ranking_cache_key(&self, run: &SelectionRun<'_>, domains: &[String]) -> Option<String> {
		self.cache.as_ref()?;

		match cache::build_ranking_cache_key(
			run.query,
			domains,
			run.options.max_candidates,
			run.options.max_tier,
		) {
			Ok(key) => Some(key),
			Err(err) => {
				tracing::warn!(error = %err, "Ranking cache key build failed.");

				None
			},
		}
	}

	async fn read_cached_ranking(&self, key: &str) -> Option<Vec<ScoredCandidate>> {
		let cache = self.cache.as_ref()?;

		match cache.get(key).await {
			Ok(Some(value)) => match cache::decode_ranking(value) {
				Ok(Some(ranking)) => {
					tracing::debug!(
						cache_key_prefix = cache::cache_key_prefix(key),
						hit = true,
						ranked = ranking.len(),
						"Ranking cache hit."
					);

					Some(ranking)
				},
				Ok(None) => None,
				Err(err) => {
					tracing::warn!(
						error = %err,
						cache_key_prefix = cache::cache_key_prefix(key),
						"Ranking cache payload decode failed."
					);

					None
				},
			},
			Ok(None) => {
				tracing::debug!(
					cache_key_prefix = cache::cache_key_prefix(key),
					hit = false,
					"Ranking cache miss."
				);

				None
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = cache::cache_key_prefix(key),
					"Ranking cache read failed."
				);

				None
			},
		}
	}

	async fn write_cached_ranking(&self, key: &str, ranking: &[ScoredCandidate]) {
		let Some(cache) = self.cache.as_ref() else { return };
		let payload = match cache::encode_ranking(ranking) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(error = %err, "Ranking cache payload encode failed.");

				return;
			},
		};
		let ttl = Duration::from_secs(self.cfg.cache.ttl_seconds);

		if let Err(err) = cache.set(key, payload, ttl).await {
			tracing::warn!(
				error = %err,
				cache_key_prefix = cache::cache_key_prefix(key),
				"Ranking cache write failed."
			);
		}
	}

	fn accept(
		&self,
		mut run: SelectionRun<'_>,
		ranking: Vec<ScoredCandidate>,
		detected: Vec<DetectedDomain>,
		cached: bool,
	) -> SelectOutcome {
		let ranked: Vec<RankedResult> = ranking
			.iter()
			.enumerate()
			.map(|(idx, scored)| {
				let rank = idx as u32 + 1;
				let reasoning = if idx == 0 {
					reasoning::selection_reasoning(scored, &ranking[1..], &detected)
				} else {
					reasoning::candidate_reasoning(rank, scored)
				};

				RankedResult {
					rank,
					candidate: scored.candidate.clone(),
					signal_score: scored.score.clone(),
					reasoning,
					confidence_band: ConfidenceBand::from_score(scored.score.boosted, &self.cfg.bands),
				}
			})
			.collect();

		let Some(selected) = ranked.first().cloned() else {
			return self.reject(run, RejectReason::BelowConfidenceThreshold, &ranking, detected);
		};

		run.timings.total_ms = elapsed_ms(run.started);
		self.check_total_budget(&run);

		tracing::info!(
			selection_id = %run.id,
			status = "selected",
			candidate_id = %selected.candidate.id,
			score = selected.signal_score.boosted,
			band = selected.confidence_band.as_str(),
			ranked = ranked.len(),
			cached,
			total_ms = run.timings.total_ms,
			"Selection finished."
		);

		SelectOutcome::Selected(SelectionOutcome {
			selection_id: run.id,
			selected,
			ranked,
			detected_domains: detected,
			timings: run.timings,
			cached,
		})
	}

	fn reject(
		&self,
		mut run: SelectionRun<'_>,
		reason: RejectReason,
		ranking: &[ScoredCandidate],
		detected: Vec<DetectedDomain>,
	) -> SelectOutcome {
		let reasoning =
			reasoning::rejection_reasoning(reason, ranking, &detected, run.options.min_confidence);
		let best_score = ranking.first().map(|top| top.score.boosted);

		run.timings.total_ms = elapsed_ms(run.started);
		self.check_total_budget(&run);

		tracing::info!(
			selection_id = %run.id,
			status = "rejected",
			reason = reason.as_str(),
			best_score,
			domains = detected.len(),
			total_ms = run.timings.total_ms,
			"Selection finished."
		);

		SelectOutcome::Rejected(RejectedOutcome {
			selection_id: run.id,
			reason,
			detected_domains: detected,
			reasoning,
			best_score,
			timings: run.timings,
		})
	}

	fn check_phase_budget(&self, run: &SelectionRun<'_>, phase: Phase, elapsed: f64) {
		let budget = &self.cfg.selection.budget;
		let limit_ms = match phase {
			Phase::DetectingDomains => budget.detection_ms,
			Phase::FilteringCandidates => budget.filtering_ms,
			Phase::Scoring | Phase::Fusing => budget.scoring_ms,
			Phase::Gating => return,
		};

		if elapsed > limit_ms as f64 {
			tracing::debug!(
				selection_id = %run.id,
				phase = phase.as_str(),
				elapsed_ms = elapsed,
				budget_ms = limit_ms,
				"Selection phase exceeded its latency budget."
			);
		}
	}

	fn check_total_budget(&self, run: &SelectionRun<'_>) {
		let budget_ms = self.cfg.selection.budget.total_ms;

		if run.timings.total_ms > budget_ms as f64 {
			tracing::warn!(
				selection_id = %run.id,
				elapsed_ms = run.timings.total_ms,
				budget_ms,
				"Selection exceeded its latency budget."
			);
		}
	}
}

/// Enforces the repository contract: active only, within the tier ceiling, at most `limit`.
fn admit_candidates(candidates: Vec<Candidate>, tier_ceiling: u32, limit: u32) -> Vec<Candidate> {
	let mut out = Vec::with_capacity(candidates.len().min(limit as usize));

	for candidate in candidates {
		if candidate.status != CandidateStatus::Active || candidate.tier > tier_ceiling {
			tracing::warn!(
				candidate_id = %candidate.id,
				tier = candidate.tier,
				status = ?candidate.status,
				"Repository returned an ineligible candidate; dropping it."
			);

			continue;
		}
		if out.len() >= limit as usize {
			break;
		}

		out.push(candidate);
	}

	out
}

fn check_unit_interval(label: &str, value: f64) -> Result<()> {
	if !value.is_finite() || !(0.0..=1.0).contains(&value) {
		return Err(invalid(format!("{label} must be a finite number in the range 0.0-1.0.")));
	}

	Ok(())
}

fn invalid(message: String) -> Error {
	Error::InvalidRequest { message }
}

fn elapsed_ms(since: Instant) -> f64 {
	since.elapsed().as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(id: &str, tier: u32, status: CandidateStatus) -> Candidate {
		Candidate {
			id: id.to_string(),
			name: String::new(),
			domains: Vec::new(),
			tier,
			priority: 0,
			status,
			extra: Default::default(),
		}
	}

	#[test]
	fn defaults_come_from_config() {
		let resolved = SelectOptions::default()
			.resolve(&Selection::default(), "query")
			.expect("Defaults must resolve.");

		assert_eq!(resolved.max_candidates, 10);
		assert_eq!(resolved.max_tier, 3);
		assert_eq!(resolved.min_confidence, 0.4);
		assert_eq!(resolved.domain_confidence_floor, 0.3);
		assert!(resolved.use_semantic_fallback);
		assert_eq!(resolved.max_domains, 5);
		assert_eq!(resolved.timeout, None);
	}

	#[test]
	fn negative_max_candidates_is_rejected() {
		let options = SelectOptions { max_candidates: Some(-1), ..Default::default() };
		let err = options.resolve(&Selection::default(), "query").expect_err("Expected error.");

		assert!(err.to_string().contains("max_candidates"), "Unexpected error: {err}");
	}

	#[test]
	fn confidence_outside_unit_interval_is_rejected() {
		for value in [-0.1, 1.5, f64::NAN] {
			let options = SelectOptions { min_confidence: Some(value), ..Default::default() };

			assert!(options.resolve(&Selection::default(), "query").is_err());
		}
	}

	#[test]
	fn zero_timeout_is_rejected() {
		let options = SelectOptions { timeout_ms: Some(0), ..Default::default() };

		assert!(options.resolve(&Selection::default(), "query").is_err());
	}

	#[test]
	fn oversized_query_is_rejected() {
		let cfg = Selection { max_query_chars: 4, ..Default::default() };
		let err = SelectOptions::default().resolve(&cfg, "hello").expect_err("Expected error.");

		assert!(err.to_string().contains("at most 4 characters"), "Unexpected error: {err}");
	}

	#[test]
	fn ineligible_candidates_are_dropped_at_the_boundary() {
		let out = admit_candidates(
			vec![
				candidate("a", 1, CandidateStatus::Active),
				candidate("b", 1, CandidateStatus::Inactive),
				candidate("c", 5, CandidateStatus::Active),
				candidate("d", 2, CandidateStatus::Active),
				candidate("e", 2, CandidateStatus::Active),
			],
			3,
			2,
		);
		let ids: Vec<&str> = out.iter().map(|item| item.id.as_str()).collect();

		assert_eq!(ids, vec!["a", "d"]);
	}
}
