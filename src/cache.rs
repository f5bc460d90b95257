//! Per-principal delegated token cache with single-flight population.
//!
//! [`TokenCache`] owns the only mutable store in the relay. Reads and the expiry check
//! happen inside one short critical section, so a returned token is never expired at the
//! instant of return. A miss registers a per-principal [`Flight`](flight::Flight); callers
//! for the same principal wait on it while callers for other principals proceed. The
//! store lock is never held across an `.await`.
//!
//! Failed exchanges are never cached. Stale entries stay in place until they are
//! overwritten, invalidated, purged, or evicted; they never satisfy a read. Invalidation
//! and reset also revoke in-flight exchanges: their callers still receive the outcome,
//! but the token is not stored.

pub mod clock;

mod flight;
mod metrics;

pub use clock::*;
pub use metrics::CacheMetrics;

// std
use std::num::NonZeroUsize;
// self
use crate::{
	_prelude::*,
	auth::{DelegatedToken, DelegationTarget, PrincipalId},
	error::RejectionKind,
	obs,
};
use flight::{Flight, FlightLease, FlightOutcome};

/// Cached token for exactly one principal; replaced whole, never patched.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	token: DelegatedToken,
	stored_at: OffsetDateTime,
}
impl CacheEntry {
	/// Token held by the entry.
	pub fn token(&self) -> &DelegatedToken {
		&self.token
	}

	/// Instant the entry was written.
	pub fn stored_at(&self) -> OffsetDateTime {
		self.stored_at
	}
}

#[derive(Default)]
struct CacheState {
	entries: HashMap<PrincipalId, CacheEntry>,
	flights: HashMap<PrincipalId, Arc<Flight>>,
}
impl CacheState {
	// A newer flight may already own the slot after an abandon + re-lead, and a revoked
	// flight owns nothing. Returns whether `flight` was still registered.
	fn detach(&mut self, principal: &PrincipalId, flight: &Arc<Flight>) -> bool {
		let owned =
			self.flights.get(principal).is_some_and(|current| Arc::ptr_eq(current, flight));

		if owned {
			self.flights.remove(principal);
		}

		owned
	}
}

enum Lookup<'a> {
	Hit(DelegatedToken),
	Join(Arc<Flight>),
	Lead(FlightLease<'a>),
}

/// Expiry-aware, single-flight cache of delegated tokens keyed by principal.
pub struct TokenCache {
	state: Mutex<CacheState>,
	clock: Arc<dyn Clock>,
	capacity: Option<NonZeroUsize>,
	metrics: Arc<CacheMetrics>,
}
impl TokenCache {
	/// Creates an unbounded cache driven by the system clock.
	pub fn new() -> Self {
		Self {
			state: Default::default(),
			clock: Arc::new(SystemClock),
			capacity: None,
			metrics: Default::default(),
		}
	}

	/// Replaces the clock used for every freshness decision.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Caps the number of entries. Inserting a new principal into a full cache first drops
	/// expired entries, then the entry closest to expiry.
	pub fn with_capacity(mut self, max_entries: NonZeroUsize) -> Self {
		self.capacity = Some(max_entries);

		self
	}

	/// Shared counters describing how lookups were served.
	pub fn metrics(&self) -> &Arc<CacheMetrics> {
		&self.metrics
	}

	/// Current instant according to the cache clock.
	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	/// Returns a fresh token for `principal`, running `fetch` at most once across all
	/// concurrent callers when no fresh entry exists.
	///
	/// Every caller that joins an in-flight fetch receives that fetch's outcome, failures
	/// included. Only successful fetches are stored.
	pub async fn get_or_fetch<F, Fut>(
		&self,
		principal: &PrincipalId,
		fetch: F,
	) -> Result<DelegatedToken>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<DelegatedToken>>,
	{
		self.get_or_fetch_inner(principal, None, fetch).await
	}

	/// Like [`get_or_fetch`](Self::get_or_fetch), but only a token requested for exactly
	/// `target` satisfies the call; an entry for another target is treated as a miss and
	/// the fetched token replaces it.
	///
	/// A caller that joined an in-flight fetch for another target does not inherit its
	/// failure; it runs its own fetch once that one settles.
	pub async fn get_or_fetch_for<F, Fut>(
		&self,
		principal: &PrincipalId,
		target: &DelegationTarget,
		fetch: F,
	) -> Result<DelegatedToken>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<DelegatedToken>>,
	{
		self.get_or_fetch_inner(principal, Some(target), fetch).await
	}

	async fn get_or_fetch_inner<F, Fut>(
		&self,
		principal: &PrincipalId,
		wanted: Option<&DelegationTarget>,
		fetch: F,
	) -> Result<DelegatedToken>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<DelegatedToken>>,
	{
		let lease = loop {
			let flight = match self.lookup(principal, wanted) {
				Lookup::Hit(token) => return Ok(token),
				Lookup::Lead(lease) => break lease,
				Lookup::Join(flight) => flight,
			};

			match flight.wait().await {
				FlightOutcome::Settled(Ok(token))
					if accepts(wanted, &token) && token.is_usable_at(self.clock.now()) =>
					return Ok(token),
				FlightOutcome::Settled(Err(e)) if flight.serves(wanted) => return Err(e),
				FlightOutcome::Settled(_) | FlightOutcome::Abandoned => continue,
			}
		};
		let outcome = fetch().await.and_then(|token| self.vet(principal, wanted, token));

		lease.settle(outcome)
	}

	/// Removes the entry for `principal`; returns whether one existed.
	///
	/// A fetch in flight for `principal` is revoked: its callers still get its outcome, but
	/// the token is not stored and later callers start a new fetch.
	pub fn invalidate(&self, principal: &PrincipalId) -> bool {
		let mut state = self.state.lock();

		state.flights.remove(principal);

		state.entries.remove(principal).is_some()
	}

	/// Drops every entry and revokes every in-flight fetch the same way
	/// [`invalidate`](Self::invalidate) does.
	pub fn reset(&self) {
		let mut state = self.state.lock();

		state.entries.clear();
		state.flights.clear();
	}

	/// Removes expired entries and returns how many were dropped.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();
		let mut state = self.state.lock();
		let before = state.entries.len();

		state.entries.retain(|_, entry| entry.token.is_usable_at(now));

		before - state.entries.len()
	}

	/// Returns the entry for `principal` regardless of freshness.
	pub fn peek(&self, principal: &PrincipalId) -> Option<CacheEntry> {
		self.state.lock().entries.get(principal).cloned()
	}

	/// Number of stored entries, stale ones included.
	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of principals with a fetch currently in flight.
	pub fn in_flight(&self) -> usize {
		self.state.lock().flights.len()
	}

	fn lookup(&self, principal: &PrincipalId, wanted: Option<&DelegationTarget>) -> Lookup<'_> {
		let now = self.clock.now();
		let mut state = self.state.lock();

		match state.entries.get(principal) {
			Some(entry) if entry.token.is_usable_at(now) && accepts(wanted, &entry.token) => {
				self.metrics.record_hit();

				return Lookup::Hit(entry.token.clone());
			},
			_ => {},
		}

		if let Some(flight) = state.flights.get(principal) {
			self.metrics.record_join();
			obs::trace_joined(principal);

			return Lookup::Join(flight.clone());
		}

		let flight = Arc::new(Flight::new(wanted.cloned()));

		state.flights.insert(principal.clone(), flight.clone());
		drop(state);
		self.metrics.record_miss();

		Lookup::Lead(FlightLease::new(self, principal.clone(), flight))
	}

	fn vet(
		&self,
		principal: &PrincipalId,
		wanted: Option<&DelegationTarget>,
		token: DelegatedToken,
	) -> Result<DelegatedToken> {
		if token.principal() != principal {
			return Err(Error::rejected(
				RejectionKind::InvalidResponse,
				format!("exchange for `{principal}` returned a token for `{}`", token.principal()),
			));
		}
		if !accepts(wanted, &token) {
			return Err(Error::rejected(
				RejectionKind::InvalidResponse,
				format!("exchange returned a token for target `{}`", token.target()),
			));
		}
		if !token.is_usable_at(self.clock.now()) {
			return Err(Error::rejected(
				RejectionKind::InvalidResponse,
				"issued token was already expired on arrival",
			));
		}

		Ok(token)
	}

	fn commit(
		&self,
		principal: &PrincipalId,
		flight: &Arc<Flight>,
		outcome: &Result<DelegatedToken>,
	) {
		let now = self.clock.now();
		let mut state = self.state.lock();
		let current = state.detach(principal, flight);

		if let (true, Ok(token)) = (current, outcome) {
			let evicted = self.make_room(&mut state, principal, now);

			state
				.entries
				.insert(principal.clone(), CacheEntry { token: token.clone(), stored_at: now });
			drop(state);

			if evicted > 0 {
				self.metrics.record_evictions(evicted);
				obs::trace_evicted(evicted);
			}
		}

		self.metrics.record_fetch(outcome.is_ok());
	}

	fn release(&self, principal: &PrincipalId, flight: &Arc<Flight>) {
		self.state.lock().detach(principal, flight);
		self.metrics.record_abandoned();
		obs::trace_abandoned(principal);
	}

	fn make_room(
		&self,
		state: &mut CacheState,
		principal: &PrincipalId,
		now: OffsetDateTime,
	) -> usize {
		let Some(capacity) = self.capacity else {
			return 0;
		};

		if state.entries.contains_key(principal) || state.entries.len() < capacity.get() {
			return 0;
		}

		let before = state.entries.len();

		state.entries.retain(|_, entry| entry.token.is_usable_at(now));

		if state.entries.len() >= capacity.get() {
			let victim = state
				.entries
				.iter()
				.min_by_key(|(_, entry)| entry.token.expires_at())
				.map(|(key, _)| key.clone());

			if let Some(victim) = victim {
				state.entries.remove(&victim);
			}
		}

		before - state.entries.len()
	}
}
impl Default for TokenCache {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("TokenCache")
			.field("entries", &state.entries.len())
			.field("in_flight", &state.flights.len())
			.field("capacity", &self.capacity)
			.finish()
	}
}

fn accepts(wanted: Option<&DelegationTarget>, token: &DelegatedToken) -> bool {
	wanted.is_none_or(|target| token.target() == target)
}
