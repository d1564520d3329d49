//! In-memory cache implementation

use crate::entry::CacheEntry;
use crate::statistics::CacheStatistics;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Values that can be stored in an [`InMemoryCache`]
///
/// `weight` is only used for the approximate memory usage reported by
/// [`InMemoryCache::get_statistics`].
pub trait CacheValue: Clone + Send + Sync + 'static {
	/// Approximate size of the value in bytes
	fn weight(&self) -> usize;
}

impl CacheValue for Bytes {
	fn weight(&self) -> usize {
		self.len()
	}
}

type Store<V> = RwLock<HashMap<String, CacheEntry<V>>>;

/// In-memory cache backend
///
/// Cloning the cache is cheap and yields a handle to the same storage.
pub struct InMemoryCache<V> {
	store: Arc<Store<V>>,
	default_ttl: Option<Duration>,
	hits: Arc<AtomicU64>,
	misses: Arc<AtomicU64>,
	evictions: Arc<AtomicU64>,
}

impl<V> Clone for InMemoryCache<V> {
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			default_ttl: self.default_ttl,
			hits: self.hits.clone(),
			misses: self.misses.clone(),
			evictions: self.evictions.clone(),
		}
	}
}

impl<V: CacheValue> InMemoryCache<V> {
	/// Create a new in-memory cache
	///
	/// # Examples
	///
	/// ```
	/// use bytes::Bytes;
	/// use reinhardt_combo_cache::InMemoryCache;
	///
	/// let cache: InMemoryCache<Bytes> = InMemoryCache::new();
	/// ```
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
			default_ttl: None,
			hits: Arc::new(AtomicU64::new(0)),
			misses: Arc::new(AtomicU64::new(0)),
			evictions: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Set a default TTL for entries stored without an explicit TTL
	///
	/// # Examples
	///
	/// ```
	/// use bytes::Bytes;
	/// use reinhardt_combo_cache::InMemoryCache;
	/// use std::time::Duration;
	///
	/// # async fn example() {
	/// let cache: InMemoryCache<Bytes> =
	///     InMemoryCache::new().with_default_ttl(Duration::from_millis(10));
	///
	/// cache.set("key", Bytes::from("value"), None).await;
	/// tokio::time::sleep(Duration::from_millis(20)).await;
	///
	/// assert_eq!(cache.get("key").await, None);
	/// # }
	/// ```
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = Some(ttl);
		self
	}

	/// Returns the value stored under `key`
	///
	/// Expired entries are reported as misses; they stay in the store until
	/// [`cleanup_expired`](Self::cleanup_expired) runs or the key is
	/// overwritten.
	pub async fn get(&self, key: &str) -> Option<V> {
		let store = self.store.read().await;

		match store.get(key) {
			Some(entry) if !entry.is_expired() => {
				self.hits.fetch_add(1, Ordering::Relaxed);
				Some(entry.value.clone())
			}
			_ => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}

	/// Stores `value` under `key`, replacing any previous entry
	///
	/// `ttl` falls back to the default TTL; with neither, the entry lives
	/// until it is deleted.
	pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
		let entry = CacheEntry::new(value, ttl.or(self.default_ttl));

		let mut store = self.store.write().await;
		store.insert(key.into(), entry);
	}

	/// Removes the entry stored under `key`
	///
	/// Returns `true` if an entry was present.
	pub async fn delete(&self, key: &str) -> bool {
		let mut store = self.store.write().await;
		store.remove(key).is_some()
	}

	/// Number of stored entries, including expired ones not yet cleaned up
	pub async fn len(&self) -> usize {
		self.store.read().await.len()
	}

	/// Returns `true` if the cache holds no entries
	pub async fn is_empty(&self) -> bool {
		self.store.read().await.is_empty()
	}

	/// Clean up expired entries
	///
	/// Returns the number of entries removed.
	///
	/// # Examples
	///
	/// ```
	/// use bytes::Bytes;
	/// use reinhardt_combo_cache::InMemoryCache;
	/// use std::time::Duration;
	///
	/// # async fn example() {
	/// let cache: InMemoryCache<Bytes> = InMemoryCache::new();
	/// cache.set("key1", Bytes::from("value"), Some(Duration::from_millis(10))).await;
	///
	/// tokio::time::sleep(Duration::from_millis(20)).await;
	///
	/// assert_eq!(cache.cleanup_expired().await, 1);
	/// assert!(cache.is_empty().await);
	/// # }
	/// ```
	pub async fn cleanup_expired(&self) -> usize {
		let removed = purge_expired(&self.store).await;
		self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
		removed
	}

	/// Get cache statistics
	///
	/// # Examples
	///
	/// ```
	/// use bytes::Bytes;
	/// use reinhardt_combo_cache::InMemoryCache;
	///
	/// # async fn example() {
	/// let cache: InMemoryCache<Bytes> = InMemoryCache::new();
	///
	/// cache.set("key1", Bytes::from("value1"), None).await;
	///
	/// let _ = cache.get("key1").await; // Hit
	/// let _ = cache.get("key2").await; // Miss
	///
	/// let stats = cache.get_statistics().await;
	/// assert_eq!(stats.hits, 1);
	/// assert_eq!(stats.misses, 1);
	/// assert_eq!(stats.entry_count, 1);
	/// # }
	/// ```
	pub async fn get_statistics(&self) -> CacheStatistics {
		let store = self.store.read().await;
		let memory_usage = store
			.values()
			.map(|entry| entry.value.weight() as u64)
			.sum::<u64>();

		CacheStatistics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			entry_count: store.len() as u64,
			memory_usage,
			evictions: self.evictions.load(Ordering::Relaxed),
		}
	}

	/// Start automatic cleanup of expired entries
	///
	/// Spawns a background task on the current tokio runtime that removes
	/// expired entries every `interval`. The task only holds a weak reference
	/// to the storage and stops once every handle to the cache is dropped.
	///
	/// # Examples
	///
	/// ```
	/// use bytes::Bytes;
	/// use reinhardt_combo_cache::InMemoryCache;
	/// use std::time::Duration;
	///
	/// # async fn example() {
	/// let cache: InMemoryCache<Bytes> = InMemoryCache::new();
	/// let _cleanup = cache.start_auto_cleanup(Duration::from_secs(60));
	/// # }
	/// ```
	pub fn start_auto_cleanup(&self, interval: Duration) -> JoinHandle<()> {
		let store: Weak<Store<V>> = Arc::downgrade(&self.store);
		let evictions = self.evictions.clone();

		tokio::spawn(async move {
			let mut interval_timer = tokio::time::interval(interval);
			// The first tick completes immediately.
			interval_timer.tick().await;
			loop {
				interval_timer.tick().await;
				let Some(store) = store.upgrade() else {
					break;
				};
				let removed = purge_expired(&store).await;
				if removed > 0 {
					evictions.fetch_add(removed as u64, Ordering::Relaxed);
					tracing::debug!(removed, "Removed expired cache entries");
				}
			}
		})
	}
}

impl<V: CacheValue> Default for InMemoryCache<V> {
	fn default() -> Self {
		Self::new()
	}
}

async fn purge_expired<V>(store: &Store<V>) -> usize {
	let mut store = store.write().await;
	let before = store.len();
	store.retain(|_, entry| !entry.is_expired());
	before - store.len()
}
