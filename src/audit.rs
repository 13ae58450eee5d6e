//! Append-only audit trail of lookup attempts with one-way query hashing.
//!
//! Every completed lookup appends exactly one entry. The queried identifier is digested
//! inside [`AuditLog::append`], so no code path can persist the raw plate or VIN.
//! Entries are never mutated or deleted by the pipeline; retention is an external
//! policy.

// crates.io
use uuid::Uuid;
// self
use crate::{_prelude::*, auth::UserId, query::LookupQuery};

/// Data class of a recorded lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
	/// Public technical vehicle data.
	Public,
	/// Sensitive owner data.
	Owner,
}
impl LookupKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LookupKind::Public => "public",
			LookupKind::Owner => "owner",
		}
	}
}
impl Display for LookupKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Single immutable audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
	/// Unique entry identifier.
	pub id: Uuid,
	/// Instant the lookup completed.
	pub recorded_at: OffsetDateTime,
	/// Caller label (user identifier or an anonymous placeholder supplied by the host).
	pub caller: String,
	/// One-way digest of the queried identifier; the raw query is never stored.
	pub query_digest: String,
	/// Data class of the lookup.
	pub kind: LookupKind,
}

/// Thread-safe append-only log of lookup attempts.
#[derive(Debug, Default)]
pub struct AuditLog {
	entries: RwLock<Vec<AuditEntry>>,
}
impl AuditLog {
	/// Appends an entry for a completed lookup and returns its identifier.
	///
	/// The query is digested here rather than by the caller, which guarantees the raw
	/// identifier cannot reach the stored record.
	pub fn append(&self, caller: &UserId, query: &LookupQuery, kind: LookupKind) -> Uuid {
		self.append_at(caller, query, kind, OffsetDateTime::now_utc())
	}

	/// [`append`](Self::append) stamped with an explicit instant.
	pub fn append_at(
		&self,
		caller: &UserId,
		query: &LookupQuery,
		kind: LookupKind,
		recorded_at: OffsetDateTime,
	) -> Uuid {
		let id = Uuid::new_v4();

		self.entries.write().push(AuditEntry {
			id,
			recorded_at,
			caller: caller.to_string(),
			query_digest: query.digest(),
			kind,
		});

		id
	}

	/// Snapshot of all recorded entries, oldest first.
	pub fn entries(&self) -> Vec<AuditEntry> {
		self.entries.read().clone()
	}

	/// Number of recorded entries.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing has been recorded.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fixtures() -> (UserId, LookupQuery) {
		(
			UserId::new("u1").expect("User fixture should be valid."),
			LookupQuery::parse("EL12345").expect("Query fixture should be valid."),
		)
	}

	#[test]
	fn entries_store_the_digest_never_the_identifier() {
		let (user, query) = fixtures();
		let log = AuditLog::default();

		log.append(&user, &query, LookupKind::Public);

		let entries = log.entries();

		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].caller, "u1");
		assert_eq!(entries[0].kind, LookupKind::Public);
		assert_eq!(entries[0].query_digest, query.digest());
		assert!(
			!entries[0].query_digest.contains(query.as_str()),
			"The raw identifier must never be persisted.",
		);
	}

	#[test]
	fn append_is_ordered_and_ids_are_unique() {
		let (user, query) = fixtures();
		let log = AuditLog::default();
		let first = log.append(&user, &query, LookupKind::Public);
		let second = log.append(&user, &query, LookupKind::Owner);

		assert_ne!(first, second);

		let kinds = log.entries().into_iter().map(|entry| entry.kind).collect::<Vec<_>>();

		assert_eq!(kinds, vec![LookupKind::Public, LookupKind::Owner]);
	}

	#[test]
	fn entries_serialize_for_export() {
		let (user, query) = fixtures();
		let log = AuditLog::default();

		log.append(&user, &query, LookupKind::Owner);

		let payload = serde_json::to_string(&log.entries())
			.expect("Audit entries should serialize to JSON.");

		assert!(payload.contains("\"owner\""));
		assert!(!payload.contains("EL12345"));
	}
}
