// crates.io
use tokio::sync::oneshot;
// self
use obo_relay::{
	_preludet::*,
	auth::{DelegatedToken, DelegationTarget, PrincipalId},
	cache::{Clock, TokenCache},
	error::NetworkError,
};

const VALIDITY: Duration = Duration::minutes(5);
const CALLERS: usize = 16;

fn principal(name: &str) -> PrincipalId {
	PrincipalId::new(name).expect("Principal identifier should be valid for cache tests.")
}

fn backend() -> DelegationTarget {
	DelegationTarget::new("urn:backend").expect("Delegation target should be valid for cache tests.")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
	for _ in 0..2_000 {
		if condition() {
			return;
		}

		tokio::time::sleep(std::time::Duration::from_millis(1)).await;
	}

	panic!("Condition was not reached in time.");
}

fn spawn_callers(
	env: &TestRelay,
	who: &PrincipalId,
	count: usize,
) -> Vec<tokio::task::JoinHandle<Result<DelegatedToken>>> {
	(0..count)
		.map(|_| {
			let relay = env.relay.clone();
			let who = who.clone();

			tokio::spawn(async move { relay.obtain_delegated_token(&who, &backend()).await })
		})
		.collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_exchange() {
	let env = build_test_relay_with(VALIDITY, CountingIssuer::held);
	let alice = principal("alice");
	let handles = spawn_callers(&env, &alice, CALLERS);

	wait_until(|| env.cache.metrics().joins() == (CALLERS - 1) as u64).await;

	assert_eq!(env.cache.in_flight(), 1);

	env.issuer.release();

	let mut tokens = Vec::with_capacity(CALLERS);

	for handle in handles {
		tokens.push(
			handle
				.await
				.expect("Caller task should not panic.")
				.expect("Every caller should observe the shared success."),
		);
	}

	assert!(tokens.iter().all(|token| token.token().expose() == "delegated-alice-1"));
	assert_eq!(env.issuer.calls(), 1);
	assert_eq!(env.cache.in_flight(), 0);
	assert_eq!(env.cache.metrics().fetch_successes(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_failure() {
	let env = build_test_relay_with(VALIDITY, CountingIssuer::held);
	let alice = principal("alice");

	env.issuer.set_failure(Some(NetworkError::Timeout.into()));

	let handles = spawn_callers(&env, &alice, CALLERS);

	wait_until(|| env.cache.metrics().joins() == (CALLERS - 1) as u64).await;
	env.issuer.release();

	for handle in handles {
		let err = handle
			.await
			.expect("Caller task should not panic.")
			.expect_err("Every caller should observe the shared failure.");

		assert!(matches!(err, Error::Network(NetworkError::Timeout)));
	}

	assert_eq!(env.issuer.calls(), 1);
	assert!(env.cache.is_empty());

	env.issuer.set_failure(None);
	env.issuer.release();

	env.relay
		.obtain_delegated_token(&alice, &backend())
		.await
		.expect("Failures must not be cached.");

	assert_eq!(env.issuer.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_exchange_does_not_block_other_principals() {
	let clock = ManualClock::default();
	let cache = Arc::new(TokenCache::new().with_clock(Arc::new(clock.clone())));
	let (unblock, blocked) = oneshot::channel::<()>();
	let alice = principal("alice");
	let bob = principal("bob");
	let issue = |who: &PrincipalId, payload: &str| {
		DelegatedToken::builder(who.clone(), backend())
			.token(payload)
			.issued_at(clock.now())
			.valid_for(VALIDITY)
			.build()
			.map_err(|e| Error::from(obo_relay::error::ConfigError::from(e)))
	};
	let slow_token = issue(&alice, "slow");
	let slow = {
		let cache = cache.clone();
		let alice = alice.clone();

		tokio::spawn(async move {
			cache
				.get_or_fetch(&alice, || async move {
					let _ = blocked.await;

					slow_token
				})
				.await
		})
	};

	wait_until(|| cache.in_flight() == 1).await;

	let fast = cache
		.get_or_fetch(&bob, || async { issue(&bob, "fast") })
		.await
		.expect("Bob's exchange should complete while Alice's is pending.");

	assert_eq!(fast.token().expose(), "fast");
	assert!(cache.peek(&alice).is_none());

	unblock.send(()).expect("Slow exchange should still be waiting.");

	let slow = slow
		.await
		.expect("Slow task should not panic.")
		.expect("Slow exchange should succeed once released.");

	assert_eq!(slow.token().expose(), "slow");
	assert_eq!(cache.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_leader_hands_the_exchange_to_a_waiter() {
	let env = build_test_relay_with(VALIDITY, CountingIssuer::held);
	let alice = principal("alice");
	let mut handles = spawn_callers(&env, &alice, 1);

	wait_until(|| env.issuer.calls() == 1).await;
	handles.extend(spawn_callers(&env, &alice, 1));
	wait_until(|| env.cache.metrics().joins() == 1).await;

	let leader = handles.remove(0);

	leader.abort();

	assert!(leader.await.is_err_and(|e| e.is_cancelled()));

	wait_until(|| env.issuer.calls() == 2).await;
	env.issuer.release();

	let waiter = handles
		.remove(0)
		.await
		.expect("Waiter task should not panic.")
		.expect("Waiter should lead a fresh exchange after the leader is cancelled.");

	assert_eq!(waiter.token().expose(), "delegated-alice-2");
	assert_eq!(env.cache.metrics().abandoned(), 1);
	assert_eq!(env.cache.in_flight(), 0);
}

#[tokio::test]
async fn exchanges_run_once_per_principal() {
	let env = build_test_relay(VALIDITY);
	for name in ["alice", "bob", "carol"] {
		for _ in 0..3 {
			env.relay
				.obtain_delegated_token(&principal(name), &backend())
				.await
				.expect("Delegation should succeed.");
		}
	}

	assert_eq!(env.issuer.calls(), 3);
	assert_eq!(env.cache.len(), 3);
}
