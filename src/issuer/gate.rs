//! Administrative capability flag for issuer clients.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{DelegationTarget, PrincipalId},
	issuer::{IssuerClient, IssuerFuture},
};

/// Shared on/off switch for a [`GatedIssuer`]; clones control the same issuer.
#[derive(Clone, Debug)]
pub struct IssuerSwitch(Arc<AtomicBool>);
impl IssuerSwitch {
	/// Creates a switch in the given state.
	pub fn new(enabled: bool) -> Self {
		Self(Arc::new(AtomicBool::new(enabled)))
	}

	/// Allows exchanges to reach the issuer again.
	pub fn enable(&self) {
		self.0.store(true, Ordering::Release);
	}

	/// Makes every subsequent exchange fail with [`Error::IssuerDisabled`].
	pub fn disable(&self) {
		self.0.store(false, Ordering::Release);
	}

	/// Current state.
	pub fn is_enabled(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}
impl Default for IssuerSwitch {
	fn default() -> Self {
		Self::new(true)
	}
}

/// Wraps an issuer client with an administrative switch.
///
/// While disabled, [`exchange`](IssuerClient::exchange) resolves to
/// [`Error::IssuerDisabled`] without touching the inner client, so no network I/O happens.
#[derive(Debug)]
pub struct GatedIssuer<C> {
	inner: C,
	switch: IssuerSwitch,
}
impl<C> GatedIssuer<C>
where
	C: IssuerClient,
{
	/// Wraps `inner` behind a new, enabled switch.
	pub fn new(inner: C) -> Self {
		Self::with_switch(inner, IssuerSwitch::default())
	}

	/// Wraps `inner` behind an existing switch.
	pub fn with_switch(inner: C, switch: IssuerSwitch) -> Self {
		Self { inner, switch }
	}

	/// Handle for flipping the switch at runtime.
	pub fn switch(&self) -> IssuerSwitch {
		self.switch.clone()
	}

	/// Wrapped client.
	pub fn inner(&self) -> &C {
		&self.inner
	}
}
impl<C> IssuerClient for GatedIssuer<C>
where
	C: IssuerClient,
{
	fn exchange<'a>(
		&'a self,
		principal: &'a PrincipalId,
		target: &'a DelegationTarget,
	) -> IssuerFuture<'a> {
		if !self.switch.is_enabled() {
			return Box::pin(std::future::ready(Err(Error::IssuerDisabled)));
		}

		self.inner.exchange(principal, target)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{CountingIssuer, ManualClock};

	#[tokio::test]
	async fn disabled_gate_never_reaches_the_inner_client() {
		let clock: Arc<dyn crate::cache::Clock> = Arc::new(ManualClock::default());
		let gated = GatedIssuer::new(CountingIssuer::new(clock, Duration::minutes(5)));
		let switch = gated.switch();
		let principal = PrincipalId::new("bob").expect("Principal fixture should be valid.");
		let target = DelegationTarget::new("urn:backend").expect("Target fixture should be valid.");

		switch.disable();

		let err = gated
			.exchange(&principal, &target)
			.await
			.expect_err("Disabled issuer must fail the exchange.");

		assert!(matches!(err, Error::IssuerDisabled));
		assert_eq!(gated.inner().calls(), 0);

		switch.enable();

		gated.exchange(&principal, &target).await.expect("Re-enabled issuer should succeed.");

		assert_eq!(gated.inner().calls(), 1);
	}
}
