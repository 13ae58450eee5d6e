//! Lookup orchestration: quota, cache, token, fetch, audit, and charge in order.
//!
//! The ordering invariant is fixed: the quota check always precedes any external call,
//! and the audit append + quota increment happen only after a successful fetch (cached
//! or fresh) — never before, and never on error, so a failed lookup consumes neither
//! the caller's quota nor their trial allowance.

// self
use crate::{
	_prelude::*,
	audit::{AuditLog, LookupKind},
	auth::Entitlement,
	broker::TokenBroker,
	cache::TtlCache,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	query::LookupQuery,
	quota::{QuotaDecision, QuotaDenial, QuotaLedger},
	registry::{OwnerRecord, RegistryClient, VehicleRecord},
};

/// Default lifetime for cached technical data (public, slow-moving).
pub const DEFAULT_TECHNICAL_TTL: Duration = Duration::hours(24);
/// Default lifetime for cached owner data (sensitive, ownership can change).
pub const DEFAULT_OWNER_TTL: Duration = Duration::seconds(600);

/// TTL policy applied to the two lookup caches.
///
/// The technical/owner split is a policy difference (TTL, auth requirement, gating)
/// over one cache mechanism, not two implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
	/// Lifetime for technical-data entries (hours-scale).
	pub technical_ttl: Duration,
	/// Lifetime for owner-data entries (minutes-scale).
	pub owner_ttl: Duration,
}
impl CachePolicy {
	/// Overrides the technical-data TTL.
	pub fn with_technical_ttl(mut self, ttl: Duration) -> Self {
		self.technical_ttl = ttl;

		self
	}

	/// Overrides the owner-data TTL.
	pub fn with_owner_ttl(mut self, ttl: Duration) -> Self {
		self.owner_ttl = ttl;

		self
	}
}
impl Default for CachePolicy {
	fn default() -> Self {
		Self { technical_ttl: DEFAULT_TECHNICAL_TTL, owner_ttl: DEFAULT_OWNER_TTL }
	}
}

/// Composes the quota ledger, token broker, registry client, caches, and audit log
/// into the request pipeline.
#[derive(Debug)]
pub struct LookupPipeline {
	quota: Arc<QuotaLedger>,
	broker: Arc<TokenBroker>,
	registry: Arc<RegistryClient>,
	audit: Arc<AuditLog>,
	technical_cache: TtlCache<VehicleRecord>,
	owner_cache: TtlCache<OwnerRecord>,
	owner_scope: String,
}
impl LookupPipeline {
	/// Assembles a pipeline from its collaborators.
	pub fn new(
		quota: Arc<QuotaLedger>,
		broker: Arc<TokenBroker>,
		registry: Arc<RegistryClient>,
		audit: Arc<AuditLog>,
		policy: CachePolicy,
		owner_scope: impl Into<String>,
	) -> Self {
		Self {
			quota,
			broker,
			registry,
			audit,
			technical_cache: TtlCache::new(policy.technical_ttl),
			owner_cache: TtlCache::new(policy.owner_ttl),
			owner_scope: owner_scope.into(),
		}
	}

	/// Returns the shared quota ledger (operational status/reset surface).
	pub fn quota(&self) -> &QuotaLedger {
		&self.quota
	}

	/// Returns the shared audit log.
	pub fn audit(&self) -> &AuditLog {
		&self.audit
	}

	/// Looks up public technical data for a vehicle.
	///
	/// Public data requires no entitlement gate and no bearer token, but quota policy
	/// and auditing apply exactly as for owner lookups.
	pub async fn lookup_technical(
		&self,
		entitlement: &Entitlement,
		raw_query: &str,
	) -> Result<VehicleRecord> {
		const KIND: FlowKind = FlowKind::Technical;

		let span = FlowSpan::new(KIND, "lookup_technical");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let query = LookupQuery::parse(raw_query)?;

				self.enforce_quota(entitlement)?;

				if let Some(record) = self.technical_cache.get(query.as_str()) {
					self.settle(entitlement, &query, LookupKind::Public);

					return Ok(record);
				}

				let record = self.registry.fetch_technical(&query).await?;

				self.technical_cache.insert(query.as_str(), record.clone());
				self.settle(entitlement, &query, LookupKind::Public);

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Looks up sensitive owner data for a vehicle.
	///
	/// Owner data is gated on a premium entitlement and fetched with a bearer token
	/// from the signed-assertion broker. Auth and registry errors propagate unchanged;
	/// the pipeline only refrains from charging quota or auditing on them.
	pub async fn lookup_owner(
		&self,
		entitlement: &Entitlement,
		raw_query: &str,
	) -> Result<OwnerRecord> {
		const KIND: FlowKind = FlowKind::Owner;

		let span = FlowSpan::new(KIND, "lookup_owner");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let query = LookupQuery::parse(raw_query)?;

				self.enforce_quota(entitlement)?;

				if !entitlement.allows_owner_lookup() {
					return Err(Error::Forbidden);
				}
				if let Some(record) = self.owner_cache.get(query.as_str()) {
					self.settle(entitlement, &query, LookupKind::Owner);

					return Ok(record);
				}

				let token = self.broker.get_token(&self.owner_scope).await?;
				let record = self.registry.fetch_owner(&query, &token).await?;

				self.owner_cache.insert(query.as_str(), record.clone());
				self.settle(entitlement, &query, LookupKind::Owner);

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	fn enforce_quota(&self, entitlement: &Entitlement) -> Result<()> {
		match self.quota.check_limit(&entitlement.user, entitlement.premium) {
			QuotaDecision::Allow => Ok(()),
			QuotaDecision::Deny(QuotaDenial::GlobalQuotaExceeded) =>
				Err(Error::GlobalQuotaExceeded),
			QuotaDecision::Deny(QuotaDenial::TrialExhausted) =>
				Err(Error::TrialExhausted { user: entitlement.user.clone() }),
		}
	}

	/// Records a completed lookup: audit append first, then the quota charge.
	fn settle(&self, entitlement: &Entitlement, query: &LookupQuery, kind: LookupKind) {
		self.audit.append(&entitlement.user, query, kind);
		self.quota.increment_usage(&entitlement.user, entitlement.premium);
	}
}
