//! Lookup query validation, normalization, and one-way digesting.
//!
//! A [`LookupQuery`] is the only value allowed to reach the quota, token, registry, and
//! cache layers: raw input is trimmed, upper-cased, and must match exactly one of the
//! two accepted identifier shapes (a two-letter + five-digit plate code, or a
//! seventeen-character VIN) before any downstream component is touched. The audit log
//! never sees the identifier itself, only the [`digest`](LookupQuery::digest).

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const PLATE_LETTERS: usize = 2;
const PLATE_DIGITS: usize = 5;
const VIN_LEN: usize = 17;

/// Errors emitted when validating a lookup query.
///
/// Display strings deliberately omit the offending input so the raw identifier never
/// leaks through error reporting paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum QueryError {
	/// The query was empty or whitespace-only.
	#[error("Lookup query cannot be empty.")]
	Empty,
	/// The query matches neither the plate nor the VIN shape.
	#[error("Lookup query matches neither the plate nor the VIN pattern.")]
	UnrecognizedFormat,
}

/// Normalized vehicle identifier accepted by the lookup pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupQuery {
	/// Regional plate code: two ASCII letters followed by five digits (e.g. `EL12345`).
	Plate(String),
	/// Seventeen-character vehicle identification number (letters `I`, `O`, `Q` excluded).
	Vin(String),
}
impl LookupQuery {
	/// Validates and normalizes a raw query string.
	///
	/// Input is trimmed and upper-cased first; exactly one identifier shape must match
	/// or the query is rejected without touching any downstream component.
	pub fn parse(raw: &str) -> Result<Self, QueryError> {
		let cleaned = raw.trim().to_ascii_uppercase();

		if cleaned.is_empty() {
			return Err(QueryError::Empty);
		}
		if is_plate(&cleaned) {
			return Ok(Self::Plate(cleaned));
		}
		if is_vin(&cleaned) {
			return Ok(Self::Vin(cleaned));
		}

		Err(QueryError::UnrecognizedFormat)
	}

	/// Returns the normalized identifier string.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Plate(value) | Self::Vin(value) => value,
		}
	}

	/// Returns `true` when the query is a VIN rather than a plate code.
	pub fn is_vin(&self) -> bool {
		matches!(self, Self::Vin(_))
	}

	/// One-way digest of the normalized identifier for audit storage.
	///
	/// The digest is a base64 (no padding) encoding of the SHA-256 hash of the
	/// normalized string; the identifier cannot be reconstructed from it.
	pub fn digest(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.as_str().as_bytes());

		STANDARD_NO_PAD.encode(hasher.finalize())
	}
}
impl Display for LookupQuery {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for LookupQuery {
	type Err = QueryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

fn is_plate(value: &str) -> bool {
	let bytes = value.as_bytes();

	bytes.len() == PLATE_LETTERS + PLATE_DIGITS
		&& bytes[..PLATE_LETTERS].iter().all(u8::is_ascii_uppercase)
		&& bytes[PLATE_LETTERS..].iter().all(u8::is_ascii_digit)
}

fn is_vin(value: &str) -> bool {
	value.len() == VIN_LEN
		&& value
			.bytes()
			.all(|b| (b.is_ascii_uppercase() || b.is_ascii_digit()) && !matches!(b, b'I' | b'O' | b'Q'))
}
