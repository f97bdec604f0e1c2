//! Randomized conservation checks: proptest over funder sets plus a
//! seeded operation-sequence soak.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::sync::Arc;
use std::time::Duration;

use reckon_common::config::{COIN_VALUE, DEFAULT_CONFIRMATION_BOUND_MS};
use reckon_harness::invariants;
use reckon_harness::rng::TestRng;
use reckon_harness::{Actor, HarnessError, LedgerHarness, SimChain};

// Derived from the default feed answer; pinned by unit tests
const DEFAULT_MINIMUM: u64 = 2_500_000;

fn harness_for(chain: &SimChain) -> LedgerHarness {
    LedgerHarness::new(
        Arc::new(chain.clone()),
        Duration::from_millis(DEFAULT_CONFIRMATION_BOUND_MS),
    )
}

fn run_conservation(values: Vec<u64>) -> Result<(), TestCaseError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|err| TestCaseError::fail(err.to_string()))?;

    rt.block_on(async move {
        let mut builder = SimChain::builder().with_funded_actor("deployer", 100 * COIN_VALUE);
        let labels: Vec<String> = (0..values.len()).map(|i| format!("funder{i}")).collect();
        for label in &labels {
            builder = builder.with_funded_actor(label.as_str(), 200 * COIN_VALUE);
        }
        let chain = builder.build().unwrap();
        let deployer = chain.actor("deployer").unwrap();
        let vault = chain.deploy_vault(&deployer).unwrap();
        let harness = harness_for(&chain);

        let mut total = 0u64;
        for (label, value) in labels.iter().zip(&values) {
            let actor = chain.actor(label).unwrap();
            harness.fund(&actor, &vault, *value).await.unwrap();
            total += value;
        }

        let settlement = harness.settle(&deployer, &vault).await.unwrap();
        prop_assert_eq!(settlement.before.target, total);
        prop_assert_eq!(
            settlement.before.target + settlement.before.owner,
            settlement.after.owner + settlement.outcome.fee()
        );
        invariants::total_supply(&chain).map_err(|err| TestCaseError::fail(err.to_string()))?;
        Ok(())
    })
}

fn run_below_minimum(value: u64) -> Result<(), TestCaseError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|err| TestCaseError::fail(err.to_string()))?;

    rt.block_on(async move {
        let chain = SimChain::builder()
            .with_funded_actor("deployer", 100 * COIN_VALUE)
            .with_funded_actor("alice", 100 * COIN_VALUE)
            .build()
            .unwrap();
        let deployer = chain.actor("deployer").unwrap();
        let alice = chain.actor("alice").unwrap();
        let vault = chain.deploy_vault(&deployer).unwrap();
        prop_assert!(value < vault.minimum_value());

        let harness = harness_for(&chain);
        let result = harness.fund(&alice, &vault, value).await;
        prop_assert!(
            matches!(result, Err(HarnessError::InsufficientValue { .. })),
            "expected InsufficientValue, got {:?}",
            result
        );
        prop_assert_eq!(chain.balance(&vault.address()), 0);
        Ok(())
    })
}

proptest! {
    #[test]
    fn conservation_holds_for_random_funder_sets(
        values in prop::collection::vec(DEFAULT_MINIMUM..5 * COIN_VALUE, 1..8)
    ) {
        run_conservation(values)?;
    }

    #[test]
    fn below_minimum_never_lands(value in 0u64..DEFAULT_MINIMUM) {
        run_below_minimum(value)?;
    }
}

#[tokio::test(start_paused = true)]
async fn randomized_operation_sequences_keep_the_books() {
    let rng = TestRng::from_env();

    let funder_labels = ["alice", "bob", "carol", "dave", "erin", "frank"];
    let mut builder = SimChain::builder().with_funded_actor("deployer", 100 * COIN_VALUE);
    for label in funder_labels {
        builder = builder.with_funded_actor(label, 500 * COIN_VALUE);
    }
    let chain = builder.build().unwrap();
    let deployer = chain.actor("deployer").unwrap();
    let funders: Vec<Actor> = funder_labels
        .iter()
        .map(|label| chain.actor(label).unwrap())
        .collect();
    let vault = chain.deploy_vault(&deployer).unwrap();
    let harness = harness_for(&chain);
    let minimum = vault.minimum_value();

    let mut expected_vault = 0u64;
    for _ in 0..40 {
        let roll = rng.next_u64() % 10;
        let funder = &funders[rng.gen_range(0..funder_labels.len() as u64) as usize];

        if roll == 0 && expected_vault > 0 {
            let settlement = harness.settle(&deployer, &vault).await.unwrap();
            assert_eq!(
                settlement.before.target,
                expected_vault,
                "{}",
                rng.replay_hint()
            );
            expected_vault = 0;
        } else if roll == 1 {
            // Non-owners bounce off regardless of the vault state
            let err = harness.withdraw(funder, &vault).await.unwrap_err();
            assert!(
                matches!(err, HarnessError::Unauthorized { .. }),
                "{}",
                rng.replay_hint()
            );
        } else {
            let value = rng.gen_range(minimum..3 * COIN_VALUE);
            harness.fund(funder, &vault, value).await.unwrap();
            expected_vault += value;
        }
    }

    if expected_vault > 0 {
        harness.settle(&deployer, &vault).await.unwrap();
    }
    invariants::total_supply(&chain).unwrap();
    assert_eq!(chain.balance(&vault.address()), 0, "{}", rng.replay_hint());
}
