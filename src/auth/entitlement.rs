//! Caller entitlement capability passed into every pipeline call.

// self
use crate::{_prelude::*, auth::UserId};

/// Caller identity + entitlement tuple supplied by the host application.
///
/// The pipeline trusts this value as given: it is read to select the quota policy and
/// to gate owner lookups, and is never mutated or resolved from ambient state. Keeping
/// it an explicit argument keeps the pipeline testable without a host runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
	/// Host-assigned user identifier (used as the quota and audit key).
	pub user: UserId,
	/// Whether the user holds a paid subscription.
	pub premium: bool,
}
impl Entitlement {
	/// Creates an entitlement for a trial (non-paying) user.
	pub fn trial(user: UserId) -> Self {
		Self { user, premium: false }
	}

	/// Creates an entitlement for a premium subscriber.
	pub fn premium(user: UserId) -> Self {
		Self { user, premium: true }
	}

	/// Returns `true` when owner lookups are permitted for this caller.
	pub fn allows_owner_lookup(&self) -> bool {
		self.premium
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn owner_access_follows_premium_flag() {
		let user = UserId::new("u1").expect("User fixture should be valid.");

		assert!(!Entitlement::trial(user.clone()).allows_owner_lookup());
		assert!(Entitlement::premium(user).allows_owner_lookup());
	}
}
