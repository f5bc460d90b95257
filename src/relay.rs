//! Delegation relay: the get-or-fetch entry point transport layers call per request.
//!
//! A fresh cached token for the principal is returned without contacting the issuer. On a
//! miss the relay runs exactly one issuer exchange per principal, stores the result, and
//! hands it to every caller that was waiting. Issuer failures pass through unchanged and
//! are never cached; a stale entry is never served in their place.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{DelegatedToken, DelegationTarget, PrincipalId},
	cache::TokenCache,
	issuer::IssuerClient,
	obs::{self, DelegationOutcome, RelaySpan},
};

/// Orchestrates the token cache and the issuer client.
#[derive(Clone)]
pub struct DelegationRelay {
	cache: Arc<TokenCache>,
	issuer: Arc<dyn IssuerClient>,
}
impl DelegationRelay {
	/// Creates a relay over an explicitly owned cache and issuer client.
	pub fn new(cache: Arc<TokenCache>, issuer: Arc<dyn IssuerClient>) -> Self {
		Self { cache, issuer }
	}

	/// Cache backing this relay.
	pub fn cache(&self) -> &Arc<TokenCache> {
		&self.cache
	}

	/// Returns a delegated token for `principal` scoped to `target`.
	///
	/// A cached token is served only while it is fresh and was requested for the same
	/// target (audience, scopes, and resource); otherwise the issuer is asked and its
	/// token replaces the entry. Concurrent
	/// callers for one principal share a single exchange and its outcome.
	pub async fn obtain_delegated_token(
		&self,
		principal: &PrincipalId,
		target: &DelegationTarget,
	) -> Result<DelegatedToken> {
		let span = RelaySpan::new("obtain_delegated_token", principal, target.audience());

		obs::record_delegation_outcome(DelegationOutcome::Attempt);

		let fetched = AtomicBool::new(false);
		let result = span
			.instrument(self.cache.get_or_fetch_for(principal, target, || {
				fetched.store(true, Ordering::Relaxed);

				self.issuer.exchange(principal, target)
			}))
			.await;
		let outcome = match &result {
			Err(_) => DelegationOutcome::Failure,
			Ok(_) if fetched.load(Ordering::Relaxed) => DelegationOutcome::Fetched,
			Ok(_) => DelegationOutcome::Hit,
		};

		span.record_outcome(outcome);
		obs::record_delegation_outcome(outcome);

		result
	}

	/// Drops the cached token for `principal` and revokes its in-flight exchange; returns
	/// whether a token was cached.
	pub fn invalidate(&self, principal: &PrincipalId) -> bool {
		self.cache.invalidate(principal)
	}

	/// Drops every cached token. In-flight exchanges still answer their callers but no
	/// longer store their result.
	pub fn reset(&self) {
		self.cache.reset();
	}
}
impl Debug for DelegationRelay {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DelegationRelay").field("cache", &self.cache).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::build_test_relay;

	fn principal(name: &str) -> PrincipalId {
		PrincipalId::new(name).expect("Principal fixture should be valid.")
	}

	fn target(audience: &str) -> DelegationTarget {
		DelegationTarget::new(audience).expect("Target fixture should be valid.")
	}

	#[tokio::test]
	async fn second_call_is_served_from_cache() {
		let env = build_test_relay(Duration::minutes(5));
		let alice = principal("alice");
		let backend = target("urn:backend");
		let first = env
			.relay
			.obtain_delegated_token(&alice, &backend)
			.await
			.expect("First call should fetch.");
		let second = env
			.relay
			.obtain_delegated_token(&alice, &backend)
			.await
			.expect("Second call should hit.");

		assert_eq!(first.token(), second.token());
		assert_eq!(env.issuer.calls(), 1);
		assert_eq!(env.cache.metrics().hits(), 1);
	}

	#[tokio::test]
	async fn audience_change_refetches_and_replaces_the_entry() {
		let env = build_test_relay(Duration::minutes(5));
		let alice = principal("alice");

		env.relay
			.obtain_delegated_token(&alice, &target("urn:orders"))
			.await
			.expect("Orders token should be fetched.");

		let billing = env
			.relay
			.obtain_delegated_token(&alice, &target("urn:billing"))
			.await
			.expect("Billing token should be fetched.");

		assert_eq!(billing.audience(), "urn:billing");
		assert_eq!(env.issuer.calls(), 2);
		assert_eq!(env.cache.len(), 1);
		assert_eq!(
			env.cache.peek(&alice).map(|entry| entry.token().audience().to_owned()),
			Some("urn:billing".into())
		);
	}

	#[tokio::test]
	async fn scope_or_resource_change_refetches() {
		let env = build_test_relay(Duration::minutes(5));
		let alice = principal("alice");
		let read = target("urn:backend")
			.with_scopes(["read"])
			.expect("Read target should be valid.");
		let admin = target("urn:backend")
			.with_scopes(["admin"])
			.expect("Admin target should be valid.");
		let pinned = read
			.clone()
			.with_resource(Url::parse("https://orders.example.com/").expect("Resource should parse."));
		let first = env
			.relay
			.obtain_delegated_token(&alice, &read)
			.await
			.expect("Read token should be fetched.");
		let second = env
			.relay
			.obtain_delegated_token(&alice, &admin)
			.await
			.expect("Admin token should be fetched.");

		assert_ne!(first.token(), second.token());
		assert_eq!(second.target(), &admin);
		assert_eq!(env.issuer.calls(), 2);

		let third = env
			.relay
			.obtain_delegated_token(&alice, &pinned)
			.await
			.expect("Resource-bound token should be fetched.");

		assert_eq!(third.target().resource(), pinned.resource());
		assert_eq!(env.issuer.calls(), 3);

		env.relay
			.obtain_delegated_token(&alice, &pinned)
			.await
			.expect("Same target should be served from cache.");

		assert_eq!(env.issuer.calls(), 3);
	}

	#[tokio::test]
	async fn invalidate_and_reset_force_new_exchanges() {
		let env = build_test_relay(Duration::minutes(5));
		let alice = principal("alice");
		let backend = target("urn:backend");

		env.relay.obtain_delegated_token(&alice, &backend).await.expect("Fetch should succeed.");

		assert!(env.relay.invalidate(&alice));
		assert!(!env.relay.invalidate(&alice));

		env.relay.obtain_delegated_token(&alice, &backend).await.expect("Refetch should succeed.");
		env.relay.reset();

		assert!(env.cache.is_empty());

		env.relay.obtain_delegated_token(&alice, &backend).await.expect("Refetch should succeed.");

		assert_eq!(env.issuer.calls(), 3);
	}
}
