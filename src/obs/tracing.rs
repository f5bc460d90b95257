// self
use crate::{_prelude::*, auth::PrincipalId, obs::DelegationOutcome};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// Span wrapping a single relay call.
#[derive(Clone, Debug)]
pub struct RelaySpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RelaySpan {
	/// Creates a span tagged with the call site, principal, and audience.
	pub fn new(stage: &'static str, principal: &PrincipalId, audience: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"obo_relay.delegation",
				stage,
				principal = %principal,
				audience,
				outcome = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, principal, audience);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Fills the deferred `outcome` field once the call resolves.
	pub fn record_outcome(&self, outcome: DelegationOutcome) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = outcome;
		}
	}
}

pub(crate) fn trace_joined(principal: &PrincipalId) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(principal = %principal, "Joined in-flight delegation exchange.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = principal;
	}
}

pub(crate) fn trace_abandoned(principal: &PrincipalId) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			principal = %principal,
			"Delegation exchange was dropped before completing; waiters will retry."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = principal;
	}
}

pub(crate) fn trace_evicted(count: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(count, "Evicted cache entries to stay within capacity.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = count;
	}
}
