//! Bearer-token models: redacting secret wrapper and the cached access-token record.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Bearer access token issued by the authorization server for a single scope.
///
/// Owned by the token broker's cache; handed out only while comfortably inside the
/// expiry safety margin. A token within the margin is treated as already stale and
/// triggers a refresh instead of being reused.
#[derive(Clone, Debug)]
pub struct AccessToken {
	/// Opaque bearer secret; never logged.
	pub secret: TokenSecret,
	/// Scope string the token was granted for.
	pub scope: String,
	/// Instant the broker received the token.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from the server's `expires_in`.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Builds a token record from the server reply fields.
	pub fn new(
		secret: impl Into<String>,
		scope: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Self {
		Self { secret: TokenSecret::new(secret), scope: scope.into(), issued_at, expires_at }
	}

	/// Returns `true` once the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` when the token is expired or within `margin` of its expiry, i.e.
	/// it must not be handed out and a refresh is due.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		self.expires_at - instant <= margin
	}
}
