//! Internal cache entry structure

use std::time::{Duration, Instant};

/// Cache entry with expiration
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
	pub(crate) value: V,
	pub(crate) expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
	pub(crate) fn new(value: V, ttl: Option<Duration>) -> Self {
		let expires_at = ttl.map(|d| Instant::now() + d);
		Self { value, expires_at }
	}

	pub(crate) fn is_expired(&self) -> bool {
		self.expires_at
			.is_some_and(|expires_at| Instant::now() >= expires_at)
	}
}
