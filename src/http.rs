//! Shared HTTP transport primitives for the token and registry clients.

// std
use std::ops::Deref;
// crates.io
use reqwest::header::{HeaderMap, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Default bound applied to every outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Every outbound call to the authorization server and the registry carries a bounded
/// timeout; a timed-out request surfaces as a transport error rather than hanging a
/// lookup indefinitely.
#[derive(Clone, Debug)]
pub struct HttpClient(ReqwestClient);
impl HttpClient {
	/// Builds a client whose requests time out after `timeout`.
	///
	/// A non-positive or out-of-range timeout is a configuration error, not something
	/// to paper over with a default.
	pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
		let timeout =
			std::time::Duration::try_from(timeout).map_err(ConfigError::http_client_build)?;
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing [`ReqwestClient`]; the caller is responsible for configuring a
	/// request timeout on it.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl Default for HttpClient {
	fn default() -> Self {
		Self::new(DEFAULT_TIMEOUT).expect("Default HTTP client construction must not fail.")
	}
}
impl AsRef<ReqwestClient> for HttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for HttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Parses a `Retry-After` header as either delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		// An overflowing delta is no usable hint at all.
		return i64::try_from(secs).ok().map(Duration::seconds);
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Truncates an upstream body for inclusion in error detail strings.
pub(crate) fn detail_preview(bytes: &[u8]) -> String {
	const MAX_DETAIL: usize = 512;

	let text = String::from_utf8_lossy(bytes);
	let mut preview = text.trim().to_owned();

	if preview.len() > MAX_DETAIL {
		let mut cut = MAX_DETAIL;

		while !preview.is_char_boundary(cut) {
			cut -= 1;
		}

		preview.truncate(cut);
	}

	preview
}
