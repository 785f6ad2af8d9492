mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Bands, Cache, Config, Detection, DomainProfile, EmbeddingProviderConfig, Entities,
	EntityVocabulary, Fusion, LatencyBudget, PatternRule, Providers, Scoring, Selection, Service,
};

use std::{collections::HashSet, fs, path::Path};

use regex::RegexBuilder;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	validate_selection(&cfg.selection)?;

	for (path, value) in [
		("detection.fast_path_confidence", cfg.detection.fast_path_confidence),
		("detection.semantic_min_similarity", cfg.detection.semantic_min_similarity),
		("scoring.vector_min_similarity", cfg.scoring.vector_min_similarity),
		("bands.high", cfg.bands.high),
		("bands.medium", cfg.bands.medium),
	] {
		validate_unit_interval(path, value)?;
	}

	if cfg.bands.medium > cfg.bands.high {
		return Err(Error::Validation {
			message: "bands.medium must be less than or equal to bands.high.".to_string(),
		});
	}

	for (path, value) in [
		("scoring.vector_limit", cfg.scoring.vector_limit),
		("scoring.keyword_limit", cfg.scoring.keyword_limit),
		("scoring.entity_limit", cfg.scoring.entity_limit),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{path} must be greater than zero.") });
		}
	}

	if !cfg.scoring.keyword_default_weight.is_finite() || cfg.scoring.keyword_default_weight < 0.0
	{
		return Err(Error::Validation {
			message: "scoring.keyword_default_weight must be a finite number, zero or greater."
				.to_string(),
		});
	}

	validate_fusion(cfg)?;

	if cfg.cache.ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "cache.ttl_seconds must be greater than zero.".to_string(),
		});
	}

	if let Some(embedding) = cfg.providers.embedding.as_ref() {
		if embedding.dimensions == 0 {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must be greater than zero.".to_string(),
			});
		}
		if embedding.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.api_key must be non-empty.".to_string(),
			});
		}
		if embedding.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	validate_catalog(cfg)?;

	Ok(())
}

fn validate_selection(selection: &Selection) -> Result<()> {
	if selection.max_candidates_limit == 0 {
		return Err(Error::Validation {
			message: "selection.max_candidates_limit must be greater than zero.".to_string(),
		});
	}
	if selection.max_candidates == 0 || selection.max_candidates > selection.max_candidates_limit
	{
		return Err(Error::Validation {
			message: "selection.max_candidates must be between 1 and selection.max_candidates_limit."
				.to_string(),
		});
	}
	if selection.max_tier == 0 {
		return Err(Error::Validation {
			message: "selection.max_tier must be greater than zero.".to_string(),
		});
	}
	if selection.max_domains == 0 {
		return Err(Error::Validation {
			message: "selection.max_domains must be greater than zero.".to_string(),
		});
	}
	if selection.max_query_chars == 0 {
		return Err(Error::Validation {
			message: "selection.max_query_chars must be greater than zero.".to_string(),
		});
	}

	validate_unit_interval("selection.min_confidence", selection.min_confidence)?;
	validate_unit_interval(
		"selection.domain_confidence_floor",
		selection.domain_confidence_floor,
	)?;

	if selection.budget.total_ms == 0 {
		return Err(Error::Validation {
			message: "selection.budget.total_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_fusion(cfg: &Config) -> Result<()> {
	for (path, value) in [
		("fusion.vector_weight", cfg.fusion.vector_weight),
		("fusion.keyword_weight", cfg.fusion.keyword_weight),
		("fusion.entity_weight", cfg.fusion.entity_weight),
		("fusion.entity_boost", cfg.fusion.entity_boost),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{path} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{path} must be zero or greater.") });
		}
	}

	if cfg.fusion.vector_weight <= 0.0
		&& cfg.fusion.keyword_weight <= 0.0
		&& cfg.fusion.entity_weight <= 0.0
	{
		return Err(Error::Validation {
			message: "At least one fusion weight must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_catalog(cfg: &Config) -> Result<()> {
	let mut names = HashSet::new();

	for domain in &cfg.domains {
		if domain.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "domains.name must be non-empty.".to_string(),
			});
		}
		if !names.insert(domain.name.as_str()) {
			return Err(Error::Validation {
				message: format!("domains.name {} is declared more than once.", domain.name),
			});
		}
	}

	for (idx, rule) in cfg.rules.iter().enumerate() {
		if rule.pattern.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("rules[{idx}].pattern must be non-empty."),
			});
		}
		if rule.domains.is_empty() || rule.domains.iter().any(|domain| domain.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!("rules[{idx}].domains must list at least one non-empty domain."),
			});
		}
		if let Err(err) = RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
			return Err(Error::Validation {
				message: format!("rules[{idx}].pattern must be a valid regular expression: {err}"),
			});
		}
	}

	for vocabulary in &cfg.entities.vocabularies {
		if vocabulary.entity_type.trim().is_empty() {
			return Err(Error::Validation {
				message: "entities.vocabularies.entity_type must be non-empty.".to_string(),
			});
		}
	}

	Ok(())
}

fn validate_unit_interval(path: &str, value: f64) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{path} must be a finite number.") });
	}
	if !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation {
			message: format!("{path} must be in the range 0.0-1.0."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	for vocabulary in &mut cfg.entities.vocabularies {
		vocabulary.terms.retain(|term| !term.trim().is_empty());
	}

	cfg.entities.units.retain(|unit| !unit.trim().is_empty());
}
