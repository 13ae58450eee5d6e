//! Durable quota counters: a shared daily budget plus per-user trial allowances.
//!
//! All counters live behind a single mutex so checks and increments are atomic with
//! respect to concurrent callers; two simultaneous increments can never lose an
//! update. The ledger performs no network I/O.

// self
use crate::{_prelude::*, auth::UserId};

/// Default shared daily budget across every caller.
pub const DEFAULT_DAILY_QUOTA: u64 = 5_000;
/// Owner lookups granted to non-paying users before an upgrade is required.
pub const TRIAL_LIMIT: u32 = 3;

/// Policy for when the global daily counter resets.
///
/// The source material does not pin this down, so it is configuration rather than a
/// hard-coded interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaWindow {
	/// Reset when the wall-clock UTC date changes.
	CalendarDay,
	/// Reset once 24 hours have elapsed since the window opened.
	Rolling,
}

/// Configured limits applied by the [`QuotaLedger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
	/// Shared daily budget across every caller.
	pub daily_quota: u64,
	/// Lifetime trial allowance per non-premium user.
	pub trial_limit: u32,
	/// Reset policy for the global counter.
	pub window: QuotaWindow,
}
impl QuotaLimits {
	/// Overrides the shared daily budget.
	pub fn with_daily_quota(mut self, daily_quota: u64) -> Self {
		self.daily_quota = daily_quota;

		self
	}

	/// Overrides the per-user trial allowance.
	pub fn with_trial_limit(mut self, trial_limit: u32) -> Self {
		self.trial_limit = trial_limit;

		self
	}

	/// Overrides the global-counter reset policy.
	pub fn with_window(mut self, window: QuotaWindow) -> Self {
		self.window = window;

		self
	}
}
impl Default for QuotaLimits {
	fn default() -> Self {
		Self { daily_quota: DEFAULT_DAILY_QUOTA, trial_limit: TRIAL_LIMIT, window: QuotaWindow::CalendarDay }
	}
}

/// Result of a quota check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuotaDecision {
	/// The lookup may proceed.
	Allow,
	/// The lookup must be denied for the given reason.
	Deny(QuotaDenial),
}

/// Reason a quota check denied the lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuotaDenial {
	/// The shared daily budget is spent, regardless of entitlement.
	GlobalQuotaExceeded,
	/// The caller's trial allowance is spent; premium callers are never denied here.
	TrialExhausted,
}

#[derive(Debug)]
struct LedgerState {
	window_opened_at: OffsetDateTime,
	global_count: u64,
	trial_counts: HashMap<UserId, u32>,
}
impl LedgerState {
	/// Rolls the global counter over when the configured window has elapsed. Trial
	/// counters are a lifetime allowance and never auto-reset.
	fn roll_window(&mut self, window: QuotaWindow, now: OffsetDateTime) {
		let elapsed = match window {
			QuotaWindow::CalendarDay => now.date() != self.window_opened_at.date(),
			QuotaWindow::Rolling => now - self.window_opened_at >= Duration::hours(24),
		};

		if elapsed {
			self.window_opened_at = now;
			self.global_count = 0;
		}
	}
}

/// Counter store enforcing the global daily quota and per-user trial allowances.
pub struct QuotaLedger {
	limits: QuotaLimits,
	state: Mutex<LedgerState>,
}
impl QuotaLedger {
	/// Creates a ledger with the provided limits; counters start at zero.
	pub fn new(limits: QuotaLimits) -> Self {
		Self {
			limits,
			state: Mutex::new(LedgerState {
				window_opened_at: OffsetDateTime::now_utc(),
				global_count: 0,
				trial_counts: HashMap::new(),
			}),
		}
	}

	/// Returns the configured limits.
	pub fn limits(&self) -> &QuotaLimits {
		&self.limits
	}

	/// Decides whether a lookup by `user` may proceed.
	///
	/// The global budget is checked first and applies to every caller; the trial
	/// allowance only applies to non-premium callers.
	pub fn check_limit(&self, user: &UserId, premium: bool) -> QuotaDecision {
		self.check_limit_at(user, premium, OffsetDateTime::now_utc())
	}

	/// [`check_limit`](Self::check_limit) evaluated against an explicit instant.
	pub fn check_limit_at(
		&self,
		user: &UserId,
		premium: bool,
		now: OffsetDateTime,
	) -> QuotaDecision {
		let mut state = self.state.lock();

		state.roll_window(self.limits.window, now);

		if state.global_count >= self.limits.daily_quota {
			return QuotaDecision::Deny(QuotaDenial::GlobalQuotaExceeded);
		}
		if !premium
			&& state.trial_counts.get(user).copied().unwrap_or(0) >= self.limits.trial_limit
		{
			return QuotaDecision::Deny(QuotaDenial::TrialExhausted);
		}

		QuotaDecision::Allow
	}

	/// Charges one completed lookup to the counters.
	///
	/// The global counter is always incremented; the trial counter only for
	/// non-premium callers. Failed lookups must never be charged, so the pipeline
	/// calls this only after a successful fetch or cache hit.
	pub fn increment_usage(&self, user: &UserId, premium: bool) {
		self.increment_usage_at(user, premium, OffsetDateTime::now_utc());
	}

	/// [`increment_usage`](Self::increment_usage) evaluated against an explicit instant.
	pub fn increment_usage_at(&self, user: &UserId, premium: bool, now: OffsetDateTime) {
		let mut state = self.state.lock();

		state.roll_window(self.limits.window, now);
		state.global_count += 1;

		if !premium {
			*state.trial_counts.entry(user.clone()).or_insert(0) += 1;
		}
	}

	/// Current value of the global counter (operational surface).
	pub fn read_global_count(&self) -> u64 {
		self.state.lock().global_count
	}

	/// Zeroes the global counter and reopens the window (operator-triggered).
	pub fn reset_global_count(&self) {
		let mut state = self.state.lock();

		state.window_opened_at = OffsetDateTime::now_utc();
		state.global_count = 0;
	}

	/// Trial lookups already consumed by `user`.
	pub fn trial_count(&self, user: &UserId) -> u32 {
		self.state.lock().trial_counts.get(user).copied().unwrap_or(0)
	}
}
impl Default for QuotaLedger {
	fn default() -> Self {
		Self::new(QuotaLimits::default())
	}
}
impl Debug for QuotaLedger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QuotaLedger")
			.field("limits", &self.limits)
			.field("global_count", &self.read_global_count())
			.finish()
	}
}
