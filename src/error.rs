//! Pipeline-level error types shared across the quota, token, registry, and lookup layers.

// self
use crate::{_prelude::*, auth::UserId};

/// Pipeline-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
///
/// Every variant maps to a distinct caller-facing signal so the presentation layer can
/// render the correct remedy (fix the query, wait, upgrade, contact an operator, retry
/// later). Nothing here is silently recoverable; the pipeline never retries on its own.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed lookup query; rejected before any external call.
	#[error(transparent)]
	Query(#[from] crate::query::QueryError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Assertion or token rejected by the authorization server or the registry.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The shared daily lookup quota is exhausted; every caller is denied until the
	/// window rolls over or an operator resets the counter.
	#[error("Daily lookup quota is exhausted.")]
	GlobalQuotaExceeded,
	/// The caller's trial allowance is spent; an upgrade to premium is required.
	#[error("Trial lookup allowance is exhausted for `{user}`.")]
	TrialExhausted {
		/// User whose trial counter reached the limit.
		user: UserId,
	},
	/// Owner data is gated on a premium entitlement the caller does not hold.
	#[error("Owner lookups require a premium entitlement.")]
	Forbidden,
	/// Upstream registry rate limited the request; surface a wait-and-retry message.
	#[error("Registry rate limited the request.")]
	UpstreamRateLimited {
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream registry returned an unexpected status.
	#[error("Registry returned an unexpected response: {status}.")]
	Upstream {
		/// HTTP status code reported by the registry.
		status: u16,
		/// Raw response detail, truncated for diagnostics.
		detail: String,
	},
}

/// Configuration and validation failures raised while assembling pipeline components.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Assertion signing key material could not be parsed.
	#[error("Assertion signing key could not be parsed.")]
	InvalidSigningKey {
		/// Underlying key parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Authentication failures from the signed-assertion grant or bearer-token use.
///
/// None of these are retried automatically: a rejected assertion means the client
/// configuration (key material, issuer, audience, clock) must be fixed by an operator,
/// and a rejected bearer token means re-authentication is required.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Authorization server rejected the signed client assertion (4xx).
	#[error("Authorization server rejected the client assertion ({status}): {detail}.")]
	AssertionRejected {
		/// HTTP status returned by the authorization server.
		status: u16,
		/// Server-supplied diagnostic detail.
		detail: String,
	},
	/// Registry rejected the bearer token; re-auth is required, not retried silently.
	#[error("Registry rejected the bearer token; re-authentication is required.")]
	TokenRejected,
	/// Client assertion could not be signed.
	#[error("Client assertion could not be signed.")]
	AssertionSigning {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned a missing or non-positive `expires_in`.
	#[error("Token endpoint response is missing a usable expiry.")]
	InvalidExpiry,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure or timeout.
	#[error("Network error occurred while calling an upstream endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
