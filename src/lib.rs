//! Quota-aware broker for national vehicle-registry lookups—plate/VIN validation,
//! signed-assertion OAuth 2.0 auth, TTL caches, and privacy-preserving audit logging
//! in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod audit;
pub mod auth;
pub mod broker;
pub mod cache;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod query;
pub mod quota;
pub mod registry;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		audit::AuditLog,
		auth::ClientId,
		broker::{AssertionConfig, TokenBroker},
		http::HttpClient,
		pipeline::{CachePolicy, LookupPipeline},
		quota::{QuotaLedger, QuotaLimits},
		registry::{RegistryClient, RegistryConfig},
	};

	/// Scope string shared by pipeline fixtures.
	pub const TEST_SCOPE: &str = "registry:vehicle/owner";

	/// Builds an HTTP client with the short timeout used across integration tests.
	pub fn test_http_client() -> HttpClient {
		HttpClient::new(Duration::seconds(5)).expect("Failed to build HTTP client for tests.")
	}

	/// Builds an assertion config pointed at a mock authorization endpoint.
	pub fn test_assertion_config(token_endpoint: Url) -> AssertionConfig {
		AssertionConfig::new(
			token_endpoint,
			ClientId::new("test-client").expect("Client identifier fixture should be valid."),
			"https://auth.test.invalid/",
			"https://auth.test.invalid/",
		)
	}

	/// Builds a registry client pointed at mock technical/owner endpoints.
	pub fn test_registry_client(technical: Url, owner: Url) -> RegistryClient {
		RegistryClient::new(
			test_http_client(),
			RegistryConfig::new(technical, owner, "demo-key-123"),
		)
	}

	/// Constructs a [`LookupPipeline`] backed by a fixture-mode token broker, default
	/// quota limits, and the provided mock registry endpoints.
	pub fn build_fixture_pipeline(
		technical: Url,
		owner: Url,
		token: &str,
	) -> (LookupPipeline, Arc<QuotaLedger>, Arc<AuditLog>) {
		build_fixture_pipeline_with_limits(technical, owner, token, QuotaLimits::default())
	}

	/// Same as [`build_fixture_pipeline`] but with caller-supplied quota limits.
	pub fn build_fixture_pipeline_with_limits(
		technical: Url,
		owner: Url,
		token: &str,
		limits: QuotaLimits,
	) -> (LookupPipeline, Arc<QuotaLedger>, Arc<AuditLog>) {
		let quota = Arc::new(QuotaLedger::new(limits));
		let audit = Arc::new(AuditLog::default());
		let auth_endpoint = Url::parse("https://auth.test.invalid/token")
			.expect("Fixture authorization endpoint should parse successfully.");
		let broker = Arc::new(TokenBroker::fixture(
			test_http_client(),
			test_assertion_config(auth_endpoint),
			token,
		));
		let registry = Arc::new(test_registry_client(technical, owner));
		let pipeline = LookupPipeline::new(
			quota.clone(),
			broker,
			registry,
			audit.clone(),
			CachePolicy::default(),
			TEST_SCOPE,
		);

		(pipeline, quota, audit)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tokio as _};
