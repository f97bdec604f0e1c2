//! Drives a parsed [`Scenario`] against a fresh chain and vault.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reckon_common::config::{
    DEFAULT_ACTOR_BALANCE, DEFAULT_CONFIRMATION_BOUND_MS, DEFAULT_CONFIRMATION_DELAY_MS,
    DEFAULT_GAS_PRICE,
};

use crate::chain::{SimChain, VaultHandle};
use crate::clock::{Clock, SystemClock};
use crate::error::HarnessError;
use crate::harness::LedgerHarness;
use crate::invariants;
use crate::scenario::{ExpectedFailure, Invariant, Scenario, Step};
use crate::target::{Actor, FundingTarget};

/// Executes scenarios step by step, collecting a human-readable log.
///
/// The clock is injected so tests can run under paused time; the default
/// is the system clock, which makes confirmation delays real.
pub struct ScenarioExecutor {
    clock: Arc<dyn Clock>,
    log: Vec<String>,
    current_step: usize,
}

/// Everything a single execution owns. Dropped with the run, so scenarios
/// never share chain state.
struct RunContext {
    chain: SimChain,
    harness: LedgerHarness,
    vault: VaultHandle,
    actors: HashMap<String, Actor>,
    /// Actors that funded successfully, for the drain check.
    funded: Vec<Actor>,
    /// When set, plain withdraw steps reconcile balances around the drain.
    settle_withdrawals: bool,
}

impl RunContext {
    fn actor(&self, name: &str) -> Result<Actor> {
        self.actors
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown actor {name:?}"))
    }
}

impl ScenarioExecutor {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            log: Vec::new(),
            current_step: 0,
        }
    }

    pub fn get_log(&self) -> &[String] {
        &self.log
    }

    /// Run every step and end-of-run invariant of `scenario`.
    ///
    /// Returns a report on success. A failed step or invariant surfaces as
    /// an error carrying the step number; [`Self::failure_report`] turns it
    /// into a persistable report.
    pub async fn execute(&mut self, scenario: Scenario) -> Result<ExecutionReport> {
        self.log.clear();
        self.current_step = 0;

        self.log(format!("Starting scenario: {}", scenario.name));
        if let Some(description) = &scenario.description {
            self.log(format!("  {description}"));
        }

        let mut run = self
            .setup_genesis(&scenario)
            .context("Failed to set up genesis")?;

        for (idx, step) in scenario.steps.iter().enumerate() {
            self.current_step = idx + 1;
            self.execute_step(&mut run, step)
                .await
                .with_context(|| format!("Failed at step {} ({})", idx + 1, step_name(step)))?;
        }

        self.check_invariants(&scenario, &run)
            .await
            .context("Invariant check failed")?;

        self.log(format!(
            "Scenario completed: {} steps",
            scenario.steps.len()
        ));
        Ok(ExecutionReport {
            scenario_name: scenario.name,
            steps_executed: self.current_step,
            success: true,
            failure: None,
            log: self.log.clone(),
        })
    }

    /// Build a failed report out of the current log and `err`.
    pub fn failure_report(&self, scenario_name: impl Into<String>, err: &anyhow::Error) -> ExecutionReport {
        ExecutionReport {
            scenario_name: scenario_name.into(),
            steps_executed: self.current_step,
            success: false,
            failure: Some(format!("{err:#}")),
            log: self.log.clone(),
        }
    }

    fn setup_genesis(&mut self, scenario: &Scenario) -> Result<RunContext> {
        let genesis = &scenario.genesis;
        let delay = Duration::from_millis(
            genesis
                .confirmation_delay_ms
                .unwrap_or(DEFAULT_CONFIRMATION_DELAY_MS),
        );
        let bound = Duration::from_millis(
            genesis
                .confirmation_bound_ms
                .unwrap_or(DEFAULT_CONFIRMATION_BOUND_MS),
        );

        let mut builder = SimChain::builder()
            .with_clock(self.clock.clone())
            .with_gas_price(genesis.gas_price.unwrap_or(DEFAULT_GAS_PRICE))
            .with_confirmation_delay(delay);
        for spec in &genesis.actors {
            let balance = spec
                .balance
                .map(|amount| amount.atomic())
                .unwrap_or(DEFAULT_ACTOR_BALANCE);
            builder = builder.with_funded_actor(spec.name.as_str(), balance);
        }
        let chain = builder.build()?;

        let mut actors = HashMap::new();
        for spec in &genesis.actors {
            let actor = chain.actor(&spec.name)?;
            self.log(format!(
                "✓ Registered {:?} at {} with balance {}",
                spec.name,
                actor.address(),
                chain.balance(&actor.address())
            ));
            actors.insert(spec.name.clone(), actor);
        }

        let owner = actors
            .get(&genesis.owner)
            .cloned()
            .ok_or_else(|| anyhow!("owner {:?} missing from genesis actors", genesis.owner))?;
        let vault = chain.deploy_vault(&owner)?;
        self.log(format!(
            "✓ Deployed vault {} for {:?} (minimum value {})",
            vault.address(),
            genesis.owner,
            vault.minimum_value()
        ));

        let harness = LedgerHarness::new(Arc::new(chain.clone()), bound);
        Ok(RunContext {
            chain,
            harness,
            vault,
            actors,
            funded: Vec::new(),
            settle_withdrawals: scenario.checks(Invariant::Conservation),
        })
    }

    async fn execute_step(&mut self, run: &mut RunContext, step: &Step) -> Result<()> {
        match step {
            Step::Fund {
                actor,
                value,
                expect,
            } => {
                let actor = run.actor(actor)?;
                let result = run.harness.fund(&actor, &run.vault, value.atomic()).await;
                let what = format!("{} funded {}", actor.label(), value.atomic());
                if self.check(*expect, result, &what)?.is_some() {
                    run.funded.push(actor);
                }
            }
            Step::Withdraw { actor, expect } => {
                let actor = run.actor(actor)?;
                if expect.is_none() && run.settle_withdrawals {
                    let result = run.harness.settle(&actor, &run.vault).await;
                    let what = format!("{} drained and reconciled the vault", actor.label());
                    if let Some(settlement) = self.check(None, result, &what)? {
                        self.log(format!("  owner balance moved {:+}", settlement.owner_gain()));
                    }
                } else {
                    let result = run.harness.withdraw(&actor, &run.vault).await;
                    let what = format!("{} withdrew", actor.label());
                    self.check(*expect, result, &what)?;
                }
            }
            Step::Settle { actor } => {
                let actor = run.actor(actor)?;
                let result = run.harness.settle(&actor, &run.vault).await;
                let what = format!("{} settled the vault", actor.label());
                if let Some(settlement) = self.check(None, result, &what)? {
                    self.log(format!("  owner balance moved {:+}", settlement.owner_gain()));
                }
            }
            Step::AssertFunded { actor, value } => {
                let actor = run.actor(actor)?;
                let recorded = run.vault.amount_funded(&actor.address()).await?;
                if recorded != value.atomic() {
                    bail!(
                        "{} has {} recorded, required {}",
                        actor.label(),
                        recorded,
                        value.atomic()
                    );
                }
                self.log(format!("✓ {} has {} recorded", actor.label(), recorded));
            }
            Step::AssertVaultBalance { value } => {
                let balance = run.chain.balance(&run.vault.address());
                if balance != value.atomic() {
                    bail!("vault holds {}, required {}", balance, value.atomic());
                }
                self.log(format!("✓ Vault holds {balance}"));
            }
        }
        Ok(())
    }

    /// Match a step result against its declared expectation.
    ///
    /// Returns the success value when the step was meant to succeed and
    /// did, `None` when it failed exactly as declared.
    fn check<T>(
        &mut self,
        expect: Option<ExpectedFailure>,
        result: Result<T, HarnessError>,
        what: &str,
    ) -> Result<Option<T>> {
        match (expect, result) {
            (None, Ok(value)) => {
                self.log(format!("✓ {what}"));
                Ok(Some(value))
            }
            (None, Err(err)) => Err(err.into()),
            (Some(expected), Err(err)) if expected.matches(&err) => {
                self.log(format!("✓ {what} failed as required ({err})"));
                Ok(None)
            }
            (Some(expected), Err(err)) => {
                bail!("expected {} failure, got: {err}", expected.tag())
            }
            (Some(expected), Ok(_)) => {
                bail!("expected {} failure but the step succeeded", expected.tag())
            }
        }
    }

    async fn check_invariants(&mut self, scenario: &Scenario, run: &RunContext) -> Result<()> {
        for invariant in &scenario.invariants {
            match invariant {
                Invariant::Conservation => {
                    // Enforced around each withdraw step via settle.
                    self.log("✓ Conservation reconciled at each withdrawal".to_string());
                }
                Invariant::TargetDrained => {
                    let prior: Vec<_> = run.funded.iter().map(|actor| actor.address()).collect();
                    invariants::target_drained(&run.chain, &run.vault, &prior).await?;
                    self.log(format!(
                        "✓ Vault drained ({} funder records cleared)",
                        prior.len()
                    ));
                }
                Invariant::TotalSupply => {
                    invariants::total_supply(&run.chain)?;
                    self.log(format!(
                        "✓ Supply books balance ({} atomic units minted)",
                        run.chain.minted_supply()
                    ));
                }
            }
        }
        Ok(())
    }

    fn log(&mut self, message: String) {
        log::debug!("{message}");
        self.log.push(message);
    }
}

impl Default for ScenarioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::Fund { .. } => "fund",
        Step::Withdraw { .. } => "withdraw",
        Step::Settle { .. } => "settle",
        Step::AssertFunded { .. } => "assert_funded",
        Step::AssertVaultBalance { .. } => "assert_vault_balance",
    }
}

/// Outcome of one scenario execution, shaped for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub scenario_name: String,
    pub steps_executed: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub log: Vec<String>,
}

impl ExecutionReport {
    pub fn print(&self) {
        println!("╔══════════════════════════════════════════════════");
        println!("║ Scenario: {}", self.scenario_name);
        println!("║ Steps executed: {}", self.steps_executed);
        println!("║ Outcome: {}", if self.success { "PASS" } else { "FAIL" });
        if let Some(failure) = &self.failure {
            println!("║ Failure: {failure}");
        }
        println!("╟──────────────────────────────────────────────────");
        for line in &self.log {
            println!("║ {line}");
        }
        println!("╚══════════════════════════════════════════════════");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::PausedClock;
    use crate::scenario::parse_scenario;

    fn paused_executor() -> ScenarioExecutor {
        ScenarioExecutor::with_clock(Arc::new(PausedClock::new()))
    }

    #[tokio::test]
    async fn runs_an_embedded_scenario() {
        let yaml = r#"
name: "Embedded round trip"
genesis:
  owner: "deployer"
  actors:
    - name: "deployer"
      balance: "100"
    - name: "alice"
      balance: "100"
steps:
  - action: "fund"
    actor: "alice"
    value: "1"
  - action: "assert_vault_balance"
    value: "1"
  - action: "withdraw"
    actor: "deployer"
invariants:
  - "conservation"
  - "target_drained"
  - "total_supply"
"#;
        let scenario = parse_scenario(yaml).unwrap();
        let mut executor = paused_executor();
        let report = executor.execute(scenario).await.unwrap();

        assert!(report.success);
        assert_eq!(report.steps_executed, 3);
        assert!(report.failure.is_none());
        assert!(report.log.iter().any(|line| line.contains("Vault drained")));
    }

    #[tokio::test]
    async fn expected_failures_are_matched() {
        let yaml = r#"
name: "Declared failures"
genesis:
  owner: "deployer"
  actors:
    - name: "deployer"
      balance: "100"
    - name: "mallory"
      balance: "100"
steps:
  - action: "fund"
    actor: "mallory"
    value: "0.001"
    expect: "insufficient_value"
  - action: "withdraw"
    actor: "mallory"
    expect: "unauthorized"
  - action: "withdraw"
    actor: "deployer"
    expect: "nothing_to_withdraw"
"#;
        let scenario = parse_scenario(yaml).unwrap();
        let mut executor = paused_executor();
        let report = executor.execute(scenario).await.unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn unexpected_success_fails_the_run() {
        let yaml = r#"
name: "Wrong expectation"
genesis:
  owner: "deployer"
  actors:
    - name: "alice"
      balance: "100"
    - name: "deployer"
      balance: "100"
steps:
  - action: "fund"
    actor: "alice"
    value: "1"
    expect: "insufficient_value"
"#;
        let scenario = parse_scenario(yaml).unwrap();
        let mut executor = paused_executor();
        let err = executor.execute(scenario).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed at step 1"));

        let report = executor.failure_report("Wrong expectation", &err);
        assert!(!report.success);
        assert_eq!(report.steps_executed, 1);
        assert!(report.failure.as_deref().unwrap().contains("insufficient_value"));
    }

    #[tokio::test]
    async fn assert_funded_catches_drift() {
        let yaml = r#"
name: "Record mismatch"
genesis:
  owner: "deployer"
  actors:
    - name: "deployer"
      balance: "100"
    - name: "alice"
      balance: "100"
steps:
  - action: "fund"
    actor: "alice"
    value: "1"
  - action: "assert_funded"
    actor: "alice"
    value: "2"
"#;
        let scenario = parse_scenario(yaml).unwrap();
        let mut executor = paused_executor();
        let err = executor.execute(scenario).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed at step 2"));
    }

    #[tokio::test]
    async fn scenario_file_single_funder() {
        let yaml = std::fs::read_to_string("scenarios/single_funder.yaml")
            .expect("scenario file should exist");
        let scenario = parse_scenario(&yaml).unwrap();
        let report = paused_executor().execute(scenario).await.unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn scenario_file_five_funders() {
        let yaml = std::fs::read_to_string("scenarios/five_funders.yaml")
            .expect("scenario file should exist");
        let scenario = parse_scenario(&yaml).unwrap();
        let report = paused_executor().execute(scenario).await.unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn scenario_file_unauthorized_withdraw() {
        let yaml = std::fs::read_to_string("scenarios/unauthorized_withdraw.yaml")
            .expect("scenario file should exist");
        let scenario = parse_scenario(&yaml).unwrap();
        let report = paused_executor().execute(scenario).await.unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn scenario_file_empty_withdraw() {
        let yaml = std::fs::read_to_string("scenarios/empty_withdraw.yaml")
            .expect("scenario file should exist");
        let scenario = parse_scenario(&yaml).unwrap();
        let report = paused_executor().execute(scenario).await.unwrap();
        assert!(report.success);
    }
}
