//! Ranking cache keys, payloads, and the bundled in-memory store.

use std::{
	sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
	time::Duration,
};

use ahash::AHashMap;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{BoxFuture, Error, RankingCache, Result, models::ScoredCandidate};

pub const RANKING_SCHEMA_VERSION: u32 = 1;

const RANKING_CACHE_KIND: &str = "ranking";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingCachePayload {
	pub schema_version: u32,
	pub ranking: Vec<ScoredCandidate>,
}

struct CacheEntry {
	value: Value,
	expires_at: OffsetDateTime,
}

/// Process-local ranking cache. Expired entries are invisible to reads and purged on writes.
#[derive(Default)]
pub struct MemoryRankingCache {
	entries: RwLock<AHashMap<String, CacheEntry>>,
}
impl MemoryRankingCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.read().values().filter(|entry| entry.expires_at > now).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn read(&self) -> RwLockReadGuard<'_, AHashMap<String, CacheEntry>> {
		self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn write(&self) -> RwLockWriteGuard<'_, AHashMap<String, CacheEntry>> {
		self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
impl RankingCache for MemoryRankingCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, eyre::Result<Option<Value>>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let entries = self.read();

			Ok(entries.get(key).filter(|entry| entry.expires_at > now).map(|entry| entry.value.clone()))
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: Value,
		ttl: Duration,
	) -> BoxFuture<'a, eyre::Result<()>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let ttl = time::Duration::try_from(ttl)?;
			let expires_at = now
				.checked_add(ttl)
				.ok_or_else(|| eyre::eyre!("Cache TTL overflows the expiry timestamp."))?;
			let mut entries = self.write();

			entries.retain(|_, entry| entry.expires_at > now);
			entries.insert(key.to_string(), CacheEntry { value, expires_at });

			Ok(())
		})
	}

	fn clear<'a>(&'a self) -> BoxFuture<'a, eyre::Result<()>> {
		Box::pin(async move {
			self.write().clear();

			Ok(())
		})
	}
}

pub fn build_ranking_cache_key(
	query: &str,
	domains: &[String],
	max_candidates: u32,
	max_tier: u32,
) -> Result<String> {
	let mut domains: Vec<&str> = domains.iter().map(String::as_str).collect();

	domains.sort_unstable();
	domains.dedup();

	let payload = serde_json::json!({
		"kind": RANKING_CACHE_KIND,
		"schema_version": RANKING_SCHEMA_VERSION,
		"query": query.trim(),
		"domains": domains,
		"max_candidates": max_candidates,
		"max_tier": max_tier,
	});

	hash_cache_key(&payload)
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

pub fn encode_ranking(ranking: &[ScoredCandidate]) -> Result<Value> {
	let payload =
		RankingCachePayload { schema_version: RANKING_SCHEMA_VERSION, ranking: ranking.to_vec() };

	serde_json::to_value(&payload)
		.map_err(|err| Error::Cache { message: format!("Failed to encode ranking payload: {err}") })
}

/// Decodes a cached ranking. Payloads from another schema version read as a miss.
pub fn decode_ranking(value: Value) -> Result<Option<Vec<ScoredCandidate>>> {
	let payload: RankingCachePayload = serde_json::from_value(value)
		.map_err(|err| Error::Cache { message: format!("Failed to decode ranking payload: {err}") })?;

	if payload.schema_version != RANKING_SCHEMA_VERSION || payload.ranking.is_empty() {
		return Ok(None);
	}

	Ok(Some(payload.ranking))
}

fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload)
		.map_err(|err| Error::Cache { message: format!("Failed to encode cache key payload: {err}") })?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cache_key_ignores_domain_order_and_query_padding() {
		let left = build_ranking_cache_key(
			" gold loan ",
			&["finance".to_string(), "banking".to_string()],
			10,
			3,
		)
		.expect("Key must build.");
		let right = build_ranking_cache_key(
			"gold loan",
			&["banking".to_string(), "finance".to_string()],
			10,
			3,
		)
		.expect("Key must build.");
		let narrower =
			build_ranking_cache_key("gold loan", &["banking".to_string()], 10, 3).expect("Key must build.");

		assert_eq!(left, right);
		assert_ne!(left, narrower);
	}

	#[test]
	fn cache_key_prefix_is_stable() {
		assert_eq!(cache_key_prefix("abcd1234efgh5678"), "abcd1234efgh");
		assert_eq!(cache_key_prefix("abc"), "abc");
	}

	#[tokio::test]
	async fn entries_expire_and_clear() {
		let cache = MemoryRankingCache::new();

		cache
			.set("live", Value::from(1), Duration::from_secs(60))
			.await
			.expect("Set must succeed.");
		cache.set("dead", Value::from(2), Duration::ZERO).await.expect("Set must succeed.");

		assert_eq!(cache.get("live").await.expect("Get must succeed."), Some(Value::from(1)));
		assert_eq!(cache.get("dead").await.expect("Get must succeed."), None);
		assert_eq!(cache.len(), 1);

		cache.clear().await.expect("Clear must succeed.");

		assert!(cache.is_empty());
	}

	#[test]
	fn foreign_schema_reads_as_miss() {
		let value = serde_json::json!({ "schema_version": 99, "ranking": [] });

		assert!(decode_ranking(value).expect("Payload must decode.").is_none());
	}
}
