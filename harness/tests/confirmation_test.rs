//! Confirmation timing: pending windows, the caller-supplied bound and
//! strictly sequential submission.

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;

use reckon_common::config::COIN_VALUE;
use reckon_harness::chain::VaultHandle;
use reckon_harness::clock::PausedClock;
use reckon_harness::{Actor, FundingTarget, HarnessError, LedgerHarness, SimChain};

fn setup(
    delay: Duration,
    bound: Duration,
    funders: &[&str],
) -> (Arc<PausedClock>, SimChain, VaultHandle, LedgerHarness) {
    let clock = Arc::new(PausedClock::new());
    let mut builder = SimChain::builder()
        .with_clock(clock.clone())
        .with_confirmation_delay(delay)
        .with_funded_actor("deployer", 100 * COIN_VALUE);
    for label in funders {
        builder = builder.with_funded_actor(*label, 100 * COIN_VALUE);
    }
    let chain = builder.build().unwrap();
    let deployer = chain.actor("deployer").unwrap();
    let vault = chain.deploy_vault(&deployer).unwrap();
    let harness = LedgerHarness::new(Arc::new(chain.clone()), bound);
    (clock, chain, vault, harness)
}

#[tokio::test]
async fn confirmation_outrunning_the_bound_times_out() {
    let bound = Duration::from_millis(100);
    let (clock, chain, vault, harness) = setup(Duration::from_secs(60), bound, &["alice"]);
    let alice = chain.actor("alice").unwrap();

    let err = harness.fund(&alice, &vault, COIN_VALUE).await.unwrap_err();
    match err {
        HarnessError::ConfirmationTimeout { bound: reported } => assert_eq!(reported, bound),
        other => panic!("unexpected error: {other}"),
    }

    // The abandoned submission never confirms, even after its delay passes
    clock.advance(Duration::from_secs(120)).await;
    assert_eq!(chain.balance(&vault.address()), 0);
    assert_eq!(chain.balance(&alice.address()), 100 * COIN_VALUE);
    assert_eq!(vault.amount_funded(&alice.address()).await.unwrap(), 0);
}

#[tokio::test]
async fn confirmation_within_the_bound_succeeds() {
    let (_clock, chain, vault, harness) = setup(
        Duration::from_millis(4_900),
        Duration::from_secs(5),
        &["alice"],
    );
    let alice = chain.actor("alice").unwrap();

    let outcome = harness.fund(&alice, &vault, COIN_VALUE).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(chain.balance(&vault.address()), COIN_VALUE);
}

#[tokio::test]
async fn pending_submissions_are_invisible_until_confirmed() {
    let (clock, chain, vault, _harness) = setup(
        Duration::from_secs(10),
        Duration::from_secs(60),
        &["alice"],
    );
    let alice = chain.actor("alice").unwrap();

    let mut submit = tokio::spawn({
        let vault = vault.clone();
        let alice = alice.clone();
        async move { vault.fund(&alice, COIN_VALUE).await }
    });
    tokio::task::yield_now().await;

    // Inside the pending window every read still sees pre-state
    assert!((&mut submit).now_or_never().is_none());
    assert_eq!(chain.balance(&vault.address()), 0);
    assert_eq!(chain.balance(&alice.address()), 100 * COIN_VALUE);
    assert_eq!(vault.amount_funded(&alice.address()).await.unwrap(), 0);

    clock.advance(Duration::from_secs(10)).await;
    let outcome = submit.await.unwrap().unwrap();
    assert!(outcome.is_success());
    assert_eq!(chain.balance(&vault.address()), COIN_VALUE);
    assert_eq!(
        vault.amount_funded(&alice.address()).await.unwrap(),
        COIN_VALUE
    );
}

#[tokio::test]
async fn sequential_operations_build_on_confirmed_state() {
    let labels = ["alice", "bob", "carol"];
    let (_clock, chain, vault, harness) = setup(
        Duration::from_millis(50),
        Duration::from_secs(5),
        &labels,
    );

    for (idx, label) in labels.iter().enumerate() {
        let actor = chain.actor(label).unwrap();
        harness.fund(&actor, &vault, COIN_VALUE).await.unwrap();
        // Each await resolves only after its confirmation is readable
        assert_eq!(vault.funder_count().unwrap(), idx + 1);
        assert_eq!(
            chain.balance(&vault.address()),
            (idx as u64 + 1) * COIN_VALUE
        );
    }
}

#[tokio::test]
async fn submission_checks_fail_fast_without_waiting() {
    // An unknown sender is rejected before the confirmation delay starts,
    // so this returns immediately even though the delay is an hour
    let (_clock, _chain, vault, harness) = setup(
        Duration::from_secs(3_600),
        Duration::from_secs(7_200),
        &[],
    );
    let ghost = Actor::new("ghost");

    let err = harness.fund(&ghost, &vault, COIN_VALUE).await.unwrap_err();
    assert!(matches!(err, HarnessError::Ledger(_)));
}
