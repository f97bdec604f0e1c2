//! End-to-end demo: fund a vault, drain it as the owner and reconcile.
//!
//! Run with `cargo run -p reckon-harness --example fund_and_withdraw`.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use reckon_common::config::{COIN_VALUE, DEFAULT_CONFIRMATION_BOUND_MS};
use reckon_harness::artifacts::ArtifactCollector;
use reckon_harness::scenario::{parse_scenario, ScenarioExecutor};
use reckon_harness::{LedgerHarness, SimChain};

const DEMO_SCENARIO: &str = r#"
name: "Demo round trip"
description: "Two funders, one drain, all invariants"
genesis:
  owner: "deployer"
  actors:
    - name: "deployer"
      balance: "100"
    - name: "alice"
      balance: "100"
    - name: "bob"
      balance: "100"
steps:
  - action: "fund"
    actor: "alice"
    value: "1.5"
  - action: "fund"
    actor: "bob"
    value: "0.5"
  - action: "assert_vault_balance"
    value: "2"
  - action: "withdraw"
    actor: "deployer"
invariants:
  - "conservation"
  - "target_drained"
  - "total_supply"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Direct harness calls first.
    let chain = SimChain::builder()
        .with_funded_actor("deployer", 100 * COIN_VALUE)
        .with_funded_actor("alice", 100 * COIN_VALUE)
        .build()?;
    let deployer = chain.actor("deployer")?;
    let alice = chain.actor("alice")?;
    let vault = chain.deploy_vault(&deployer)?;
    let harness = LedgerHarness::new(
        Arc::new(chain.clone()),
        Duration::from_millis(DEFAULT_CONFIRMATION_BOUND_MS),
    );

    println!("Vault {} deployed for deployer", vault.address());
    println!("  minimum accepted value: {} atomic units", vault.minimum_value());

    let outcome = harness.fund(&alice, &vault, COIN_VALUE).await?;
    println!("alice funded {} atomic units", COIN_VALUE);
    println!("  tx {} fee {}", outcome.hash, outcome.fee());
    println!("  vault balance now {}", chain.balance(&vault.address()));

    let settlement = harness.settle(&deployer, &vault).await?;
    println!("deployer drained the vault");
    println!("  tx {} fee {}", settlement.outcome.hash, settlement.outcome.fee());
    println!(
        "  owner balance {} -> {} (gain {:+})",
        settlement.before.owner,
        settlement.after.owner,
        settlement.owner_gain()
    );
    println!(
        "  conservation: {} + {} == {} + {}",
        settlement.before.target,
        settlement.before.owner,
        settlement.after.owner,
        settlement.outcome.fee()
    );

    // Same flow, driven by the scenario DSL.
    let scenario = parse_scenario(DEMO_SCENARIO)?;
    let mut executor = ScenarioExecutor::new();
    let report = match executor.execute(scenario).await {
        Ok(report) => report,
        Err(err) => executor.failure_report("Demo round trip", &err),
    };
    report.print();

    let collector = ArtifactCollector::new(std::env::temp_dir().join("reckon-artifacts"));
    let path = collector.save_report(&report).await?;
    println!("Report saved to {}", path.display());

    Ok(())
}
