//! # Reinhardt Combo Cache
//!
//! Concurrent in-memory cache with per-entry expiration.
//!
//! Values are stored as-is (no serialization) and cloned out on read, so
//! cached values should be cheap to clone (`Bytes`, or `Arc`-backed types).
//!
//! ## Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use reinhardt_combo_cache::InMemoryCache;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let cache: InMemoryCache<Bytes> = InMemoryCache::new();
//! cache.set("key", Bytes::from("value"), Some(Duration::from_secs(60))).await;
//!
//! assert_eq!(cache.get("key").await, Some(Bytes::from("value")));
//! # }
//! ```
//!
//! ## Concurrency
//!
//! All operations take `&self` and may be called from any number of tasks.
//! There is no coordination between a `get` miss and the following `set`:
//! two tasks missing the same key may both compute and store a value, the
//! last write wins.

#![warn(missing_docs)]

mod entry;
pub mod in_memory;
pub mod statistics;

pub use in_memory::{CacheValue, InMemoryCache};
pub use statistics::CacheStatistics;
