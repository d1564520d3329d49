//! Per-resource and per-combination caches
//!
//! Both caches are process-wide services shared through `Arc` and backed by
//! [`InMemoryCache`]. The per-resource cache is used when source timestamps
//! are checked; the combination cache only when they are not.

use crate::transform::TransformedContent;
use bytes::{Bytes, BytesMut};
use reinhardt_combo_cache::{CacheStatistics, CacheValue, InMemoryCache};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Transformed content of one resource plus the instant it was cached
#[derive(Debug, Clone)]
pub struct ResourceEntry {
	content: TransformedContent,
	created_at: Instant,
}

impl ResourceEntry {
	/// Creates an entry stamped with the current instant
	pub fn new(content: TransformedContent) -> Self {
		Self {
			content,
			created_at: Instant::now(),
		}
	}

	pub fn content(&self) -> &TransformedContent {
		&self.content
	}

	/// Consumes the entry, returning its content
	pub fn into_content(self) -> TransformedContent {
		self.content
	}

	/// Time since the entry was created
	pub fn age(&self) -> Duration {
		self.created_at.elapsed()
	}

	/// Returns `true` while the entry may be served without checking the
	/// source
	pub fn is_fresh(&self, interval: Duration) -> bool {
		self.age() < interval
	}
}

impl CacheValue for ResourceEntry {
	fn weight(&self) -> usize {
		self.content.content().len()
	}
}

/// Cache of transformed resources keyed by `"{location}?{kind}"`
///
/// Entries live for twice the check interval, so a resource requested at
/// least that often is revalidated by timestamp instead of being
/// re-transformed.
pub struct ResourceCache {
	cache: InMemoryCache<ResourceEntry>,
	interval: Duration,
}

impl ResourceCache {
	/// Creates a cache for the given timestamp check interval
	pub fn new(interval: Duration) -> Self {
		Self {
			cache: InMemoryCache::new().with_default_ttl(interval.saturating_mul(2)),
			interval,
		}
	}

	/// Timestamp check interval
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Returns the entry stored under `key`
	pub async fn get(&self, key: &str) -> Option<ResourceEntry> {
		self.cache.get(key).await
	}

	/// Stores `content` under `key` with a fresh creation instant
	pub async fn put(&self, key: impl Into<String>, content: TransformedContent) {
		self.cache.set(key, ResourceEntry::new(content), None).await;
	}

	/// Removes the entry stored under `key`
	pub async fn remove(&self, key: &str) -> bool {
		self.cache.delete(key).await
	}

	/// Number of stored entries, expired ones included
	pub async fn len(&self) -> usize {
		self.cache.len().await
	}

	pub async fn is_empty(&self) -> bool {
		self.cache.is_empty().await
	}

	pub async fn statistics(&self) -> CacheStatistics {
		self.cache.get_statistics().await
	}

	/// Starts removing expired entries every check interval
	///
	/// The task ends once the cache is dropped.
	pub fn start_auto_cleanup(&self) -> JoinHandle<()> {
		self.cache.start_auto_cleanup(self.interval)
	}
}

/// Transformed payloads of one combination, in request order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedPayload {
	parts: Arc<Vec<Bytes>>,
}

impl CombinedPayload {
	pub fn new(parts: Vec<Bytes>) -> Self {
		Self {
			parts: Arc::new(parts),
		}
	}

	pub fn parts(&self) -> &[Bytes] {
		&self.parts
	}

	/// Total size in bytes
	pub fn byte_len(&self) -> usize {
		self.parts.iter().map(Bytes::len).sum()
	}

	/// Concatenates every part into one body
	pub fn concat(&self) -> Bytes {
		if let [single] = self.parts.as_slice() {
			return single.clone();
		}
		let mut body = BytesMut::with_capacity(self.byte_len());
		for part in self.parts.iter() {
			body.extend_from_slice(part);
		}
		body.freeze()
	}
}

impl CacheValue for CombinedPayload {
	fn weight(&self) -> usize {
		self.byte_len()
	}
}

/// Cache of combined payloads keyed by the rendered module list
///
/// Entries never expire; the cache is only used when source timestamps are
/// not checked.
#[derive(Default)]
pub struct CombinationCache {
	cache: InMemoryCache<CombinedPayload>,
}

impl CombinationCache {
	pub fn new() -> Self {
		Self {
			cache: InMemoryCache::new(),
		}
	}

	pub async fn get(&self, key: &str) -> Option<CombinedPayload> {
		self.cache.get(key).await
	}

	pub async fn put(&self, key: impl Into<String>, payload: CombinedPayload) {
		self.cache.set(key, payload, None).await;
	}

	pub async fn len(&self) -> usize {
		self.cache.len().await
	}

	pub async fn is_empty(&self) -> bool {
		self.cache.is_empty().await
	}

	pub async fn statistics(&self) -> CacheStatistics {
		self.cache.get_statistics().await
	}
}
