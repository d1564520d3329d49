//! Cache statistics

/// Counters reported by [`InMemoryCache::get_statistics`](crate::InMemoryCache::get_statistics)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
	/// Lookups that found a live entry
	pub hits: u64,
	/// Lookups that found nothing or an expired entry
	pub misses: u64,
	/// Stored entries, including expired ones not yet cleaned up
	pub entry_count: u64,
	/// Approximate size of the stored values in bytes
	pub memory_usage: u64,
	/// Expired entries removed by cleanup
	pub evictions: u64,
}
