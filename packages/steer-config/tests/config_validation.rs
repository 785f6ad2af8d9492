use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use steer_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn set_entry(value: &mut Value, section: &str, key: &str, entry: Value) {
	let table = value
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Sample config must include [{section}]."));

	table.insert(key.to_string(), entry);
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("steer_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_value(value: &Value) -> steer_config::Result<Config> {
	let payload = toml::to_string(value).expect("Failed to render test config.");
	let path = write_temp_config(payload);
	let result = steer_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn sample_config_loads() {
	let cfg = load_value(&sample_value()).expect("Sample config must be valid.");

	assert_eq!(cfg.domains.len(), 2);
	assert_eq!(cfg.rules.len(), 2);
	assert_eq!(cfg.fusion.vector_weight, 0.4);
	assert_eq!(cfg.selection.budget.total_ms, 500);
	assert!(cfg.providers.embedding.is_some());
}

#[test]
fn empty_config_uses_defaults() {
	let cfg: Config = toml::from_str("").expect("Empty config must parse.");

	assert!(steer_config::validate(&cfg).is_ok());
	assert_eq!(cfg.selection.max_candidates, 10);
	assert_eq!(cfg.selection.max_tier, 3);
	assert_eq!(cfg.selection.min_confidence, 0.4);
	assert_eq!(cfg.selection.domain_confidence_floor, 0.3);
	assert!(cfg.selection.use_semantic_fallback);
	assert_eq!(cfg.detection.fast_path_confidence, 0.8);
	assert_eq!(cfg.scoring.vector_min_similarity, 0.7);
	assert_eq!(cfg.fusion.entity_boost, 0.3);
	assert!(cfg.providers.embedding.is_none());
}

#[test]
fn fusion_weights_must_be_finite_and_non_negative() {
	let mut value = sample_value();

	set_entry(&mut value, "fusion", "keyword_weight", Value::Float(-0.1));

	let err = load_value(&value).expect_err("Expected fusion weight validation error.");

	assert!(
		err.to_string().contains("fusion.keyword_weight must be zero or greater."),
		"Unexpected error: {err}"
	);
}

#[test]
fn at_least_one_fusion_weight_is_positive() {
	let mut cfg = Config::default();

	cfg.fusion.vector_weight = 0.0;
	cfg.fusion.keyword_weight = 0.0;
	cfg.fusion.entity_weight = 0.0;

	let err = steer_config::validate(&cfg).expect_err("Expected fusion weight validation error.");

	assert!(matches!(err, Error::Validation { .. }));
	assert!(err.to_string().contains("At least one fusion weight"), "Unexpected error: {err}");
}

#[test]
fn min_confidence_must_be_in_unit_interval() {
	let mut value = sample_value();

	set_entry(&mut value, "selection", "min_confidence", Value::Float(1.5));

	let err = load_value(&value).expect_err("Expected min_confidence validation error.");

	assert!(
		err.to_string().contains("selection.min_confidence must be in the range 0.0-1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn bands_must_be_ordered() {
	let mut cfg = Config::default();

	cfg.bands.medium = 0.8;
	cfg.bands.high = 0.6;

	let err = steer_config::validate(&cfg).expect_err("Expected band validation error.");

	assert!(err.to_string().contains("bands.medium"), "Unexpected error: {err}");
}

#[test]
fn cache_ttl_must_be_positive() {
	let mut value = sample_value();

	set_entry(&mut value, "cache", "ttl_seconds", Value::Integer(0));

	let err = load_value(&value).expect_err("Expected cache TTL validation error.");

	assert!(
		err.to_string().contains("cache.ttl_seconds must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn rules_must_name_a_domain() {
	let mut value = sample_value();
	let rules = value
		.get_mut("rules")
		.and_then(Value::as_array_mut)
		.expect("Sample config must include [[rules]].");
	let first = rules[0].as_table_mut().expect("Rule must be a table.");

	first.insert("domains".to_string(), Value::Array(Vec::new()));

	let err = load_value(&value).expect_err("Expected rule validation error.");

	assert!(
		err.to_string().contains("rules[0].domains must list at least one non-empty domain."),
		"Unexpected error: {err}"
	);
}

#[test]
fn rule_patterns_must_compile() {
	let mut value = sample_value();
	let rules = value
		.get_mut("rules")
		.and_then(Value::as_array_mut)
		.expect("Sample config must include [[rules]].");
	let second = rules[1].as_table_mut().expect("Rule must be a table.");

	second.insert("pattern".to_string(), Value::String("(unclosed".to_string()));

	let err = load_value(&value).expect_err("Expected pattern validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error: {err}");
	assert!(
		err.to_string().contains("rules[1].pattern must be a valid regular expression"),
		"Unexpected error: {err}"
	);
}

#[test]
fn duplicate_domain_names_are_rejected() {
	let mut cfg = Config::default();

	for _ in 0..2 {
		cfg.domains.push(steer_config::DomainProfile {
			name: "billing".to_string(),
			description: String::new(),
			priority: 1,
		});
	}

	let err = steer_config::validate(&cfg).expect_err("Expected duplicate domain error.");

	assert!(err.to_string().contains("declared more than once"), "Unexpected error: {err}");
}

#[test]
fn blank_vocabulary_terms_are_dropped() {
	let mut value = sample_value();
	let entities = value
		.get_mut("entities")
		.and_then(Value::as_table_mut)
		.expect("Sample config must include [entities].");

	entities.insert(
		"units".to_string(),
		Value::Array(vec![Value::String("mg".to_string()), Value::String("  ".to_string())]),
	);

	let cfg = load_value(&value).expect("Config must be valid.");

	assert_eq!(cfg.entities.units, vec!["mg".to_string()]);
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("steer_config_missing_file.toml");
	let err = steer_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
