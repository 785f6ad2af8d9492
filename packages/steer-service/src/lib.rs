pub mod cache;
pub mod detect;
pub mod models;
pub mod select;

mod error;

pub use cache::MemoryRankingCache;
pub use detect::{DomainDetector, SemanticClassifier};
pub use error::{Error, Result};
pub use models::{
	Candidate, CandidateStatus, ConfidenceBand, EntityHit, KeywordHit, PhaseTimings,
	RankedResult, RejectReason, RejectedOutcome, ScoredCandidate, SelectOutcome, SelectionOutcome,
	SignalScore, VectorHit,
};
pub use select::{
	SelectOptions,
	fusion::{FusionEngine, SignalSet},
};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

use steer_config::{Config, EmbeddingProviderConfig};
use steer_domain::entity::EntityExtractor;
use steer_providers::embedding;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Eligible candidates pre-sorted by `(tier ascending, priority descending)`.
pub trait CandidateRepository
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		domain_filter: Option<&'a [String]>,
		tier_ceiling: u32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Candidate>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn nearest<'a>(
		&'a self,
		vector: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>>;
}

pub trait KeywordIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<KeywordHit>>>;
}

pub trait EntityIndex
where
	Self: Send + Sync,
{
	fn lookup_by_entities<'a>(
		&'a self,
		entity_texts: &'a [String],
		entity_types: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EntityHit>>>;
}

/// Shared ranking cache. Implementations own their concurrency discipline.
pub trait RankingCache
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, color_eyre::Result<Option<Value>>>;

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: Value,
		ttl: Duration,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn clear<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

/// Candidate data collaborators. Absent indexes contribute no signal.
#[derive(Clone)]
pub struct Sources {
	pub repository: Arc<dyn CandidateRepository>,
	pub vectors: Option<Arc<dyn VectorIndex>>,
	pub keywords: Option<Arc<dyn KeywordIndex>>,
	pub entities: Option<Arc<dyn EntityIndex>>,
}
impl Sources {
	pub fn new(repository: Arc<dyn CandidateRepository>) -> Self {
		Self { repository, vectors: None, keywords: None, entities: None }
	}

	pub fn with_vectors(mut self, vectors: Arc<dyn VectorIndex>) -> Self {
		self.vectors = Some(vectors);

		self
	}

	pub fn with_keywords(mut self, keywords: Arc<dyn KeywordIndex>) -> Self {
		self.keywords = Some(keywords);

		self
	}

	pub fn with_entities(mut self, entities: Arc<dyn EntityIndex>) -> Self {
		self.entities = Some(entities);

		self
	}
}

pub struct SteerService {
	pub cfg: Config,
	pub providers: Providers,
	pub sources: Sources,
	pub cache: Option<Arc<dyn RankingCache>>,
	detector: DomainDetector,
	entities: EntityExtractor,
	fusion: FusionEngine,
}
impl SteerService {
	pub fn new(cfg: Config, sources: Sources) -> Result<Self> {
		Self::with_providers(cfg, sources, Providers::default())
	}

	pub fn with_providers(cfg: Config, sources: Sources, providers: Providers) -> Result<Self> {
		let detector = DomainDetector::new(&cfg, providers.embedding.clone())?;
		let entities = EntityExtractor::new(&cfg.entities)?;
		let fusion = FusionEngine::new(&cfg.fusion);
		let cache: Option<Arc<dyn RankingCache>> =
			if cfg.cache.enabled { Some(Arc::new(MemoryRankingCache::new())) } else { None };

		Ok(Self { cfg, providers, sources, cache, detector, entities, fusion })
	}

	/// Replaces the ranking cache. `None` disables caching.
	pub fn with_cache(mut self, cache: Option<Arc<dyn RankingCache>>) -> Self {
		self.cache = cache;

		self
	}

	pub fn detector(&self) -> &DomainDetector {
		&self.detector
	}

	pub fn fusion(&self) -> &FusionEngine {
		&self.fusion
	}

	pub async fn clear_cache(&self) -> Result<()> {
		let Some(cache) = self.cache.as_ref() else { return Ok(()) };

		cache.clear().await.map_err(|err| Error::Cache { message: err.to_string() })?;

		tracing::info!("Ranking cache cleared.");

		Ok(())
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
