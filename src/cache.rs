//! Page-total caching
//!
//! Paged listings tend to be re-issued with identical filters while a user
//! walks through pages; the count query is the expensive half of each
//! request. Totals are cached per template + dialect + bound parameters and
//! expire on a per-template TTL.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cache of previously computed page totals
pub trait PageCountCache: Send + Sync {
	/// Live total for `key`, if one is cached
	fn get(&self, key: &str) -> Option<u64>;

	/// Store a total, valid for `alive`
	fn put(&self, key: String, total: u64, alive: Duration);

	/// Drop a cached total (after a reconciliation correction)
	fn invalidate(&self, key: &str);
}

struct CacheEntry {
	total: u64,
	expires_at: Instant,
}

/// In-process [`PageCountCache`] with TTL expiry and a size ceiling
pub struct InMemoryPageCountCache {
	entries: RwLock<HashMap<String, CacheEntry>>,
	max_entries: usize,
}

impl InMemoryPageCountCache {
	pub fn new(max_entries: usize) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			max_entries: max_entries.max(1),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl Default for InMemoryPageCountCache {
	fn default() -> Self {
		Self::new(10_000)
	}
}

impl PageCountCache for InMemoryPageCountCache {
	fn get(&self, key: &str) -> Option<u64> {
		let entries = self.entries.read();
		let entry = entries.get(key)?;
		if entry.expires_at <= Instant::now() {
			return None;
		}
		Some(entry.total)
	}

	fn put(&self, key: String, total: u64, alive: Duration) {
		let now = Instant::now();
		let mut entries = self.entries.write();
		entries.retain(|_, e| e.expires_at > now);
		if entries.len() >= self.max_entries
			&& !entries.contains_key(&key)
			&& let Some(evict) = entries
				.iter()
				.min_by_key(|(_, e)| e.expires_at)
				.map(|(k, _)| k.clone())
		{
			entries.remove(&evict);
		}
		entries.insert(
			key,
			CacheEntry {
				total,
				expires_at: now + alive,
			},
		);
	}

	fn invalidate(&self, key: &str) {
		self.entries.write().remove(key);
	}
}
