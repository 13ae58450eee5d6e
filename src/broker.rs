//! Signed-assertion token acquisition with per-scope caching + singleflight guards.
//!
//! The broker performs the `urn:ietf:params:oauth:grant-type:jwt-bearer` grant against
//! a configured authorization server: it signs a short-lived RS256 client assertion
//! (`{iss, aud, scope, iat, exp, jti}`), posts it, and caches the returned bearer token
//! per scope. Cached tokens are reused until they fall inside the expiry safety margin,
//! at which point the next caller refreshes synchronously. A per-scope singleflight
//! guard ensures concurrent callers piggy-back on the same in-flight grant instead of
//! stampeding the authorization server, and the guard is released on every exit path so
//! a failed or timed-out grant never wedges later refreshes.
//!
//! A rejected assertion (4xx) is never retried automatically: it signals a
//! configuration problem (key material, issuer/audience, clock skew) an operator must
//! fix.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientId},
	error::{AuthError, ConfigError, TransportError},
	http::{HttpClient, detail_preview},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Default lifetime of a signed client assertion.
pub const DEFAULT_ASSERTION_TTL: Duration = Duration::seconds(120);
/// Default safety margin before token expiry; a token inside it triggers a refresh.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(30);

/// Static configuration for the signed-assertion grant.
#[derive(Clone, Debug)]
pub struct AssertionConfig {
	/// Authorization server token endpoint.
	pub token_endpoint: Url,
	/// Registered OAuth 2.0 client identifier (the assertion issuer).
	pub client_id: ClientId,
	/// `iss` claim value.
	pub issuer: String,
	/// `aud` claim value.
	pub audience: String,
	/// Lifetime of each signed assertion (a few minutes at most).
	pub assertion_ttl: Duration,
	/// Safety margin subtracted from the access token's expiry before reuse.
	pub expiry_margin: Duration,
}
impl AssertionConfig {
	/// Creates a config with default assertion TTL and expiry margin.
	pub fn new(
		token_endpoint: Url,
		client_id: ClientId,
		issuer: impl Into<String>,
		audience: impl Into<String>,
	) -> Self {
		Self {
			token_endpoint,
			client_id,
			issuer: issuer.into(),
			audience: audience.into(),
			assertion_ttl: DEFAULT_ASSERTION_TTL,
			expiry_margin: DEFAULT_EXPIRY_MARGIN,
		}
	}

	/// Overrides the assertion lifetime.
	pub fn with_assertion_ttl(mut self, ttl: Duration) -> Self {
		self.assertion_ttl = ttl;

		self
	}

	/// Overrides the expiry safety margin.
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = margin;

		self
	}
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	iss: &'a str,
	aud: &'a str,
	scope: &'a str,
	iat: i64,
	exp: i64,
	jti: String,
}

#[derive(Deserialize)]
struct TokenEndpointReply {
	access_token: String,
	expires_in: i64,
}

enum SignerMode {
	/// Signs real assertions with the configured private key.
	Live(Box<EncodingKey>),
	/// Returns a fixed deterministic token without signing or network I/O.
	///
	/// Must be enabled explicitly via [`TokenBroker::fixture`]; it exists so pipeline
	/// behavior downstream of token acquisition is reproducible in tests.
	Fixture(String),
}

/// Acquires and caches bearer tokens via the signed-assertion grant.
pub struct TokenBroker {
	http: HttpClient,
	config: AssertionConfig,
	signer: SignerMode,
	cache: RwLock<HashMap<String, AccessToken>>,
	grant_guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl TokenBroker {
	/// Creates a live broker signing assertions with the provided RSA private key (PEM).
	pub fn new(
		http: HttpClient,
		config: AssertionConfig,
		private_key_pem: &[u8],
	) -> Result<Self> {
		let key = EncodingKey::from_rsa_pem(private_key_pem)
			.map_err(|source| ConfigError::InvalidSigningKey { source })?;

		Ok(Self {
			http,
			config,
			signer: SignerMode::Live(Box::new(key)),
			cache: RwLock::new(HashMap::new()),
			grant_guards: Mutex::new(HashMap::new()),
		})
	}

	/// Creates a broker that returns `token` for every scope without any signing or
	/// network operation. Never the default; intended for tests.
	pub fn fixture(http: HttpClient, config: AssertionConfig, token: impl Into<String>) -> Self {
		Self {
			http,
			config,
			signer: SignerMode::Fixture(token.into()),
			cache: RwLock::new(HashMap::new()),
			grant_guards: Mutex::new(HashMap::new()),
		}
	}

	/// Returns the broker configuration.
	pub fn config(&self) -> &AssertionConfig {
		&self.config
	}

	/// Returns a valid bearer token for `scope`, reusing the cached one when it is
	/// comfortably outside the expiry safety margin.
	pub async fn get_token(&self, scope: &str) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::TokenGrant;

		let span = FlowSpan::new(KIND, "get_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = self.grant_guard(scope);
				// At most one grant in flight per scope; the RAII lock is released on
				// every exit path, including errors and timeouts.
				let _singleflight = guard.lock().await;
				let now = OffsetDateTime::now_utc();

				if let Some(cached) = self
					.cache
					.read()
					.get(scope)
					.filter(|token| !token.needs_refresh_at(now, self.config.expiry_margin))
				{
					return Ok(cached.clone());
				}

				let token = match &self.signer {
					SignerMode::Live(key) => self.exchange_assertion(scope, key, now).await?,
					SignerMode::Fixture(fixed) => AccessToken::new(
						fixed.clone(),
						scope,
						now,
						now + Duration::hours(1),
					),
				};

				self.cache.write().insert(scope.to_owned(), token.clone());

				Ok(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Signs a fresh assertion and exchanges it at the token endpoint.
	async fn exchange_assertion(
		&self,
		scope: &str,
		key: &EncodingKey,
		now: OffsetDateTime,
	) -> Result<AccessToken> {
		let assertion = self.sign_assertion(scope, key, now)?;
		let response = self
			.http
			.post(self.config.token_endpoint.clone())
			.form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		if status.is_client_error() {
			return Err(AuthError::AssertionRejected {
				status: status.as_u16(),
				detail: detail_preview(&bytes),
			}
			.into());
		}
		if !status.is_success() {
			return Err(Error::Upstream {
				status: status.as_u16(),
				detail: detail_preview(&bytes),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let reply: TokenEndpointReply = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| AuthError::TokenResponseParse {
				source,
				status: Some(status.as_u16()),
			})?;

		if reply.expires_in <= 0 {
			return Err(AuthError::InvalidExpiry.into());
		}

		Ok(AccessToken::new(
			reply.access_token,
			scope,
			now,
			now + Duration::seconds(reply.expires_in),
		))
	}

	fn sign_assertion(
		&self,
		scope: &str,
		key: &EncodingKey,
		now: OffsetDateTime,
	) -> Result<String> {
		let claims = AssertionClaims {
			iss: &self.config.issuer,
			aud: &self.config.audience,
			scope,
			iat: now.unix_timestamp(),
			exp: (now + self.config.assertion_ttl).unix_timestamp(),
			jti: Uuid::new_v4().to_string(),
		};
		let mut header = Header::new(Algorithm::RS256);

		header.kid = Some(self.config.client_id.to_string());

		jsonwebtoken::encode(&header, &claims, key)
			.map_err(|source| AuthError::AssertionSigning { source }.into())
	}

	/// Returns (and creates on demand) the singleflight guard for a scope.
	fn grant_guard(&self, scope: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.grant_guards.lock();

		guards.entry(scope.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for TokenBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("config", &self.config)
			.field("fixture_mode", &matches!(self.signer, SignerMode::Fixture(_)))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::HttpClient;

	fn config() -> AssertionConfig {
		AssertionConfig::new(
			Url::parse("https://auth.test.invalid/token")
				.expect("Token endpoint fixture should parse."),
			ClientId::new("client-1").expect("Client fixture should be valid."),
			"https://auth.test.invalid/",
			"https://auth.test.invalid/",
		)
	}

	#[test]
	fn live_broker_rejects_malformed_key_material() {
		let err = TokenBroker::new(HttpClient::default(), config(), b"not a pem")
			.expect_err("Garbage key material must be rejected at construction.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidSigningKey { .. })));
	}

	#[tokio::test]
	async fn fixture_mode_returns_the_configured_token_without_io() {
		let broker = TokenBroker::fixture(HttpClient::default(), config(), "fixed-token");
		let first = broker
			.get_token("registry:vehicle/owner")
			.await
			.expect("Fixture token acquisition should succeed.");
		let second = broker
			.get_token("registry:vehicle/owner")
			.await
			.expect("Cached fixture token should be reused.");

		assert_eq!(first.secret.expose(), "fixed-token");
		assert_eq!(second.secret.expose(), "fixed-token");
		assert_eq!(first.scope, "registry:vehicle/owner");
	}

	#[tokio::test]
	async fn fixture_tokens_are_cached_per_scope() {
		let broker = TokenBroker::fixture(HttpClient::default(), config(), "fixed-token");
		let read = broker.get_token("registry:read").await.expect("Read-scope grant should succeed.");
		let write =
			broker.get_token("registry:write").await.expect("Write-scope grant should succeed.");

		assert_eq!(read.scope, "registry:read");
		assert_eq!(write.scope, "registry:write");
		assert_eq!(broker.cache.read().len(), 2);
	}
}
