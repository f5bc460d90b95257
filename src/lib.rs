//! On-behalf-of delegation relay for gateways: a per-principal token cache with single-flight
//! issuer exchanges, fail-closed expiry, and pluggable issuer and identity collaborators.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod obs;
pub mod relay;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use async_lock::Semaphore;
	// self
	use crate::{
		auth::{DelegatedToken, DelegationTarget, PrincipalId},
		cache::{Clock, TokenCache},
		error::ConfigError,
		issuer::{GatedIssuer, IssuerClient, IssuerFuture, IssuerSwitch},
		relay::DelegationRelay,
	};
	#[cfg(feature = "reqwest")]
	use crate::issuer::{IssuerDescriptor, ReqwestIssuerClient};

	/// Clock whose instant only moves when a test says so.
	#[derive(Clone, Debug)]
	pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
	impl ManualClock {
		/// Creates a clock frozen at `instant`.
		pub fn new(instant: OffsetDateTime) -> Self {
			Self(Arc::new(Mutex::new(instant)))
		}

		/// Moves the clock forward by `delta`.
		pub fn advance(&self, delta: Duration) {
			*self.0.lock() += delta;
		}

		/// Jumps the clock to `instant`.
		pub fn set(&self, instant: OffsetDateTime) {
			*self.0.lock() = instant;
		}
	}
	impl Default for ManualClock {
		fn default() -> Self {
			Self::new(time::macros::datetime!(2025-06-01 09:00 UTC))
		}
	}
	impl Clock for ManualClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.lock()
		}
	}

	/// Scriptable issuer that counts exchanges and can hold them open until released.
	pub struct CountingIssuer {
		clock: Arc<dyn Clock>,
		validity: Duration,
		calls: AtomicUsize,
		failure: Mutex<Option<Error>>,
		gate: Option<Semaphore>,
	}
	impl CountingIssuer {
		/// Issues tokens valid for `validity`, stamped with `clock`.
		pub fn new(clock: Arc<dyn Clock>, validity: Duration) -> Self {
			Self { clock, validity, calls: AtomicUsize::new(0), failure: Mutex::new(None), gate: None }
		}

		/// Holds every exchange open until [`CountingIssuer::release`] is called.
		pub fn held(mut self) -> Self {
			self.gate = Some(Semaphore::new(0));

			self
		}

		/// Lets held exchanges complete.
		pub fn release(&self) {
			if let Some(gate) = &self.gate {
				gate.add_permits(1);
			}
		}

		/// Makes subsequent exchanges fail with `error`, or succeed again with `None`.
		pub fn set_failure(&self, error: Option<Error>) {
			*self.failure.lock() = error;
		}

		/// Number of exchanges that reached this issuer.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl IssuerClient for CountingIssuer {
		fn exchange<'a>(
			&'a self,
			principal: &'a PrincipalId,
			target: &'a DelegationTarget,
		) -> IssuerFuture<'a> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			Box::pin(async move {
				if let Some(gate) = &self.gate {
					let _permit = gate.acquire().await;
				}
				let failure = self.failure.lock().clone();

				if let Some(error) = failure {
					return Err(error);
				}

				DelegatedToken::builder(principal.clone(), target.clone())
					.token(format!("delegated-{principal}-{call}"))
					.issued_at(self.clock.now())
					.valid_for(self.validity)
					.build()
					.map_err(|e| Error::from(ConfigError::from(e)))
			})
		}
	}

	/// Wiring returned by [`build_test_relay`].
	pub struct TestRelay {
		/// Relay under test.
		pub relay: DelegationRelay,
		/// Cache owned by the relay.
		pub cache: Arc<TokenCache>,
		/// Issuer behind the capability gate.
		pub issuer: Arc<CountingIssuer>,
		/// Capability flag controlling the issuer.
		pub switch: IssuerSwitch,
		/// Clock shared by the cache and the issuer.
		pub clock: ManualClock,
	}

	/// Builds a relay over a gated [`CountingIssuer`] issuing tokens valid for `validity`.
	pub fn build_test_relay(validity: Duration) -> TestRelay {
		build_test_relay_with(validity, |issuer| issuer)
	}

	/// Same as [`build_test_relay`] but lets the caller adjust the issuer first.
	pub fn build_test_relay_with(
		validity: Duration,
		configure: impl FnOnce(CountingIssuer) -> CountingIssuer,
	) -> TestRelay {
		let clock = ManualClock::default();
		let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
		let issuer = Arc::new(configure(CountingIssuer::new(shared_clock.clone(), validity)));
		let gated = GatedIssuer::new(issuer.clone());
		let switch = gated.switch();
		let cache = Arc::new(TokenCache::new().with_clock(shared_clock));
		let relay = DelegationRelay::new(cache.clone(), Arc::new(gated));

		TestRelay { relay, cache, issuer, switch, clock }
	}

	/// Builds a reqwest client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Constructs a [`ReqwestIssuerClient`] on top of [`test_reqwest_http_client`].
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_issuer(
		descriptor: IssuerDescriptor,
		client_secret: &str,
	) -> ReqwestIssuerClient {
		ReqwestIssuerClient::with_client(descriptor, test_reqwest_http_client())
			.with_client_secret(client_secret)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
