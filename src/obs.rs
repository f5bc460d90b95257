//! Optional observability helpers for relay calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to run every relay call inside an `obo_relay.delegation` span carrying
//!   `stage`, `principal`, `audience`, and a deferred `outcome` field, and to emit cache
//!   events (single-flight joins, abandoned leaders, evictions).
//! - Enable `metrics` to increment the `obo_relay_delegation_total` counter for every
//!   attempt/hit/fetch/failure, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each relay call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DelegationOutcome {
	/// Entry to the relay.
	Attempt,
	/// Served from cache (directly or by joining another caller's exchange).
	Hit,
	/// This call ran the issuer exchange and stored its token.
	Fetched,
	/// Failure propagated back to the caller.
	Failure,
}
impl DelegationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DelegationOutcome::Attempt => "attempt",
			DelegationOutcome::Hit => "hit",
			DelegationOutcome::Fetched => "fetched",
			DelegationOutcome::Failure => "failure",
		}
	}
}
impl Display for DelegationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
