use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	#[serde(default)]
	pub providers: Providers,
	#[serde(default)]
	pub selection: Selection,
	#[serde(default)]
	pub detection: Detection,
	#[serde(default)]
	pub scoring: Scoring,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub bands: Bands,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub domains: Vec<DomainProfile>,
	#[serde(default)]
	pub rules: Vec<PatternRule>,
	#[serde(default)]
	pub entities: Entities,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: default_log_level() }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Providers {
	/// Optional. Without it the vector signal and the semantic domain fallback are skipped.
	pub embedding: Option<EmbeddingProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Selection {
	#[serde(default = "default_max_candidates")]
	pub max_candidates: u32,
	#[serde(default = "default_max_tier")]
	pub max_tier: u32,
	#[serde(default = "default_min_confidence")]
	pub min_confidence: f64,
	#[serde(default = "default_domain_confidence_floor")]
	pub domain_confidence_floor: f64,
	#[serde(default = "default_true")]
	pub use_semantic_fallback: bool,
	#[serde(default = "default_max_domains")]
	pub max_domains: u32,
	/// Upper bound accepted for a per-request `max_candidates`.
	#[serde(default = "default_max_candidates_limit")]
	pub max_candidates_limit: u32,
	#[serde(default = "default_max_query_chars")]
	pub max_query_chars: u32,
	#[serde(default)]
	pub budget: LatencyBudget,
}
impl Default for Selection {
	fn default() -> Self {
		Self {
			max_candidates: default_max_candidates(),
			max_tier: default_max_tier(),
			min_confidence: default_min_confidence(),
			domain_confidence_floor: default_domain_confidence_floor(),
			use_semantic_fallback: true,
			max_domains: default_max_domains(),
			max_candidates_limit: default_max_candidates_limit(),
			max_query_chars: default_max_query_chars(),
			budget: LatencyBudget::default(),
		}
	}
}

/// Soft per-query latency targets. Overruns are logged, never enforced.
#[derive(Debug, Clone, Deserialize)]
pub struct LatencyBudget {
	#[serde(default = "default_budget_total_ms")]
	pub total_ms: u64,
	#[serde(default = "default_budget_detection_ms")]
	pub detection_ms: u64,
	#[serde(default = "default_budget_filtering_ms")]
	pub filtering_ms: u64,
	#[serde(default = "default_budget_scoring_ms")]
	pub scoring_ms: u64,
}
impl Default for LatencyBudget {
	fn default() -> Self {
		Self {
			total_ms: default_budget_total_ms(),
			detection_ms: default_budget_detection_ms(),
			filtering_ms: default_budget_filtering_ms(),
			scoring_ms: default_budget_scoring_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
	/// Pattern confidence at which the semantic phase is skipped.
	#[serde(default = "default_fast_path_confidence")]
	pub fast_path_confidence: f64,
	/// Semantic matches must score strictly above this similarity.
	#[serde(default = "default_semantic_min_similarity")]
	pub semantic_min_similarity: f64,
}
impl Default for Detection {
	fn default() -> Self {
		Self {
			fast_path_confidence: default_fast_path_confidence(),
			semantic_min_similarity: default_semantic_min_similarity(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scoring {
	#[serde(default = "default_signal_limit")]
	pub vector_limit: u32,
	#[serde(default = "default_vector_min_similarity")]
	pub vector_min_similarity: f64,
	#[serde(default = "default_signal_limit")]
	pub keyword_limit: u32,
	/// Relevance of a keyword hit when the index supplies no native rank.
	#[serde(default = "default_keyword_default_weight")]
	pub keyword_default_weight: f64,
	#[serde(default = "default_signal_limit")]
	pub entity_limit: u32,
}
impl Default for Scoring {
	fn default() -> Self {
		Self {
			vector_limit: default_signal_limit(),
			vector_min_similarity: default_vector_min_similarity(),
			keyword_limit: default_signal_limit(),
			keyword_default_weight: default_keyword_default_weight(),
			entity_limit: default_signal_limit(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fusion {
	#[serde(default = "default_vector_weight")]
	pub vector_weight: f64,
	#[serde(default = "default_keyword_weight")]
	pub keyword_weight: f64,
	#[serde(default = "default_entity_weight")]
	pub entity_weight: f64,
	/// Multiplier on the entity match fraction in the post-fusion rerank.
	#[serde(default = "default_entity_boost")]
	pub entity_boost: f64,
}
impl Default for Fusion {
	fn default() -> Self {
		Self {
			vector_weight: default_vector_weight(),
			keyword_weight: default_keyword_weight(),
			entity_weight: default_entity_weight(),
			entity_boost: default_entity_boost(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bands {
	#[serde(default = "default_band_high")]
	pub high: f64,
	#[serde(default = "default_band_medium")]
	pub medium: f64,
}
impl Default for Bands {
	fn default() -> Self {
		Self { high: default_band_high(), medium: default_band_medium() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cache {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_cache_ttl_seconds")]
	pub ttl_seconds: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, ttl_seconds: default_cache_ttl_seconds() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainProfile {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default = "default_domain_priority")]
	pub priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternRule {
	pub domains: Vec<String>,
	/// Regular expression, compiled case-insensitively.
	pub pattern: String,
	#[serde(default = "default_domain_priority")]
	pub priority: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
	#[serde(default)]
	pub vocabularies: Vec<EntityVocabulary>,
	/// Units recognized in "<number> <unit>" constraints, e.g. "mg" or "days".
	#[serde(default)]
	pub units: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityVocabulary {
	pub entity_type: String,
	pub terms: Vec<String>,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_true() -> bool {
	true
}

fn default_max_candidates() -> u32 {
	10
}

fn default_max_tier() -> u32 {
	3
}

fn default_min_confidence() -> f64 {
	0.4
}

fn default_domain_confidence_floor() -> f64 {
	0.3
}

fn default_max_domains() -> u32 {
	5
}

fn default_max_candidates_limit() -> u32 {
	100
}

fn default_max_query_chars() -> u32 {
	2_000
}

fn default_budget_total_ms() -> u64 {
	500
}

fn default_budget_detection_ms() -> u64 {
	100
}

fn default_budget_filtering_ms() -> u64 {
	50
}

fn default_budget_scoring_ms() -> u64 {
	200
}

fn default_fast_path_confidence() -> f64 {
	0.8
}

fn default_semantic_min_similarity() -> f64 {
	0.3
}

fn default_signal_limit() -> u32 {
	20
}

fn default_vector_min_similarity() -> f64 {
	0.7
}

fn default_keyword_default_weight() -> f64 {
	1.0
}

fn default_vector_weight() -> f64 {
	0.4
}

fn default_keyword_weight() -> f64 {
	0.3
}

fn default_entity_weight() -> f64 {
	0.3
}

fn default_entity_boost() -> f64 {
	0.3
}

fn default_band_high() -> f64 {
	0.7
}

fn default_band_medium() -> f64 {
	0.4
}

fn default_cache_ttl_seconds() -> u64 {
	300
}

fn default_domain_priority() -> i32 {
	100
}
