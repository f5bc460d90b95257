// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing how lookups were served.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	misses: AtomicU64,
	joins: AtomicU64,
	fetch_successes: AtomicU64,
	fetch_failures: AtomicU64,
	abandoned: AtomicU64,
	evictions: AtomicU64,
}
impl CacheMetrics {
	/// Lookups answered by a fresh entry.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Lookups that found no usable entry and led a fetch.
	pub fn misses(&self) -> u64 {
		self.misses.load(Ordering::Relaxed)
	}

	/// Lookups that waited on another caller's in-flight fetch.
	pub fn joins(&self) -> u64 {
		self.joins.load(Ordering::Relaxed)
	}

	/// Fetches whose token was stored.
	pub fn fetch_successes(&self) -> u64 {
		self.fetch_successes.load(Ordering::Relaxed)
	}

	/// Fetches that failed and left the store untouched.
	pub fn fetch_failures(&self) -> u64 {
		self.fetch_failures.load(Ordering::Relaxed)
	}

	/// Fetches dropped by their caller before completing.
	pub fn abandoned(&self) -> u64 {
		self.abandoned.load(Ordering::Relaxed)
	}

	/// Entries removed to respect the capacity bound.
	pub fn evictions(&self) -> u64 {
		self.evictions.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch(&self, success: bool) {
		if success {
			self.fetch_successes.fetch_add(1, Ordering::Relaxed);
		} else {
			self.fetch_failures.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_abandoned(&self) {
		self.abandoned.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_evictions(&self, count: usize) {
		self.evictions.fetch_add(count as u64, Ordering::Relaxed);
	}
}
