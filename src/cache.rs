//! Parameterized expiring cache shared by the technical-data and owner-data stores.
//!
//! The two lookup caches differ only in policy (TTL length, what they hold), not in
//! mechanism, so one generic [`TtlCache`] backs both. Entries are independent per key:
//! concurrent misses for the same key may race on insert and the last writer wins,
//! which is harmless because every written value is equally valid at write time.

// self
use crate::_prelude::*;

/// Cached value plus the metadata needed to decide expiry.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
	/// The cached payload.
	pub value: T,
	/// Instant the entry was written.
	pub stored_at: OffsetDateTime,
	/// Lifetime after which the entry is treated as absent.
	pub ttl: Duration,
}
impl<T> CacheEntry<T> {
	/// Returns `true` once the entry has outlived its TTL at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.stored_at + self.ttl
	}
}

/// Thread-safe in-process cache with a fixed per-cache TTL.
///
/// An expired entry is treated as absent, never returned-then-discarded: reads filter
/// on expiry and leave the map untouched, and [`purge_expired`](Self::purge_expired)
/// exists for housekeeping.
#[derive(Debug)]
pub struct TtlCache<T> {
	ttl: Duration,
	entries: RwLock<HashMap<String, CacheEntry<T>>>,
}
impl<T> TtlCache<T>
where
	T: Clone,
{
	/// Creates a cache whose entries live for `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, entries: RwLock::new(HashMap::new()) }
	}

	/// Returns the configured entry lifetime.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Fetches an unexpired entry for `key`, if present.
	pub fn get(&self, key: &str) -> Option<T> {
		self.get_at(key, OffsetDateTime::now_utc())
	}

	/// Fetches an entry evaluated against an explicit instant.
	pub fn get_at(&self, key: &str, instant: OffsetDateTime) -> Option<T> {
		self.entries
			.read()
			.get(key)
			.filter(|entry| !entry.is_expired_at(instant))
			.map(|entry| entry.value.clone())
	}

	/// Stores a value for `key`, replacing any previous entry.
	pub fn insert(&self, key: impl Into<String>, value: T) {
		self.insert_at(key, value, OffsetDateTime::now_utc());
	}

	/// Stores a value stamped with an explicit write instant.
	pub fn insert_at(&self, key: impl Into<String>, value: T, instant: OffsetDateTime) {
		self.entries
			.write()
			.insert(key.into(), CacheEntry { value, stored_at: instant, ttl: self.ttl });
	}

	/// Drops every expired entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.entries.write();
		let before = guard.len();

		guard.retain(|_, entry| !entry.is_expired_at(now));

		before - guard.len()
	}

	/// Number of stored entries, expired ones included.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
