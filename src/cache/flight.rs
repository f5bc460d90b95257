//! Per-principal in-flight exchange handles.
//!
//! The caller that finds neither a usable entry nor an in-flight exchange becomes the
//! leader and receives a [`FlightLease`]. Every later caller for the same principal clones
//! the shared [`Flight`] and waits on it. The lease publishes exactly one outcome: the
//! exchange result when settled, or [`FlightOutcome::Abandoned`] if the leader is dropped
//! first so waiters can elect a new leader instead of blocking forever.

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	auth::{DelegatedToken, DelegationTarget, PrincipalId},
	cache::TokenCache,
};

#[derive(Clone, Debug)]
pub(super) enum FlightOutcome {
	Settled(Result<DelegatedToken>),
	Abandoned,
}

#[derive(Debug)]
pub(super) struct Flight {
	target: Option<DelegationTarget>,
	outcome: OnceCell<FlightOutcome>,
}
impl Flight {
	pub(super) fn new(target: Option<DelegationTarget>) -> Self {
		Self { target, outcome: OnceCell::new() }
	}

	/// Whether this exchange was started for what `wanted` asks for, so its failure is
	/// also the answer for that caller.
	pub(super) fn serves(&self, wanted: Option<&DelegationTarget>) -> bool {
		wanted.is_none() || self.target.as_ref() == wanted
	}

	pub(super) async fn wait(&self) -> FlightOutcome {
		self.outcome.wait().await.clone()
	}

	// Only the owning lease initializes the cell, so this never contends.
	fn publish(&self, outcome: FlightOutcome) {
		let _ = self.outcome.set_blocking(outcome);
	}
}

pub(super) struct FlightLease<'a> {
	cache: &'a TokenCache,
	principal: PrincipalId,
	flight: Arc<Flight>,
	settled: bool,
}
impl<'a> FlightLease<'a> {
	pub(super) fn new(cache: &'a TokenCache, principal: PrincipalId, flight: Arc<Flight>) -> Self {
		Self { cache, principal, flight, settled: false }
	}

	/// Stores a successful token unless the flight was revoked meanwhile, clears the
	/// in-flight marker, and wakes every waiter.
	pub(super) fn settle(mut self, outcome: Result<DelegatedToken>) -> Result<DelegatedToken> {
		self.cache.commit(&self.principal, &self.flight, &outcome);
		self.settled = true;
		self.flight.publish(FlightOutcome::Settled(outcome.clone()));

		outcome
	}
}
impl Drop for FlightLease<'_> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}

		self.cache.release(&self.principal, &self.flight);
		self.flight.publish(FlightOutcome::Abandoned);
	}
}
