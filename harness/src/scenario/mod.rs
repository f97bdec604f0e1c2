//! YAML scenario DSL.
//!
//! Scenarios declare a genesis allocation, an ordered list of fund and
//! withdraw steps and the invariants to check at the end. Each execution
//! deploys a fresh vault for the named owner, so no state leaks between
//! scenarios.
//!
//! Amount syntax, everywhere an amount appears:
//! - a bare number is atomic units: `balance: 250000000`
//! - a quoted string is decimal whole coins: `balance: "2.5"`
//! - YAML floats are rejected; quote decimal amounts instead
//!
//! An actor without an explicit `balance` starts with 100 coins.
//!
//! ## Example
//!
//! ```yaml
//! name: "Single funder settles"
//! description: "Alice funds one coin, the owner drains the vault"
//! genesis:
//!   owner: "deployer"
//!   actors:
//!     - name: "deployer"
//!       balance: "100"
//!     - name: "alice"
//!       balance: "100"
//! steps:
//!   - action: "fund"
//!     actor: "alice"
//!     value: "1"
//!   - action: "withdraw"
//!     actor: "deployer"
//! invariants:
//!   - "conservation"
//!   - "target_drained"
//!   - "total_supply"
//! ```
//!
//! A step may declare the failure it requires with `expect`, for example
//! `expect: "insufficient_value"`; steps without `expect` must succeed.

pub mod executor;

pub use executor::{ExecutionReport, ScenarioExecutor};

use anyhow::{bail, Context, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use reckon_common::config::{COIN_DECIMALS, COIN_VALUE};

use crate::error::HarnessError;

// Guard against fee overflow in scenarios with absurd prices
const MAX_SCENARIO_GAS_PRICE: u64 = 1_000_000;

/// Atomic amount parsed from either a bare integer (atomic units) or a
/// quoted decimal string (whole coins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinAmount(pub u64);

impl CoinAmount {
    pub fn atomic(self) -> u64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for CoinAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = CoinAmount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an atomic integer or a decimal coin string like \"1.5\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<CoinAmount, E> {
                Ok(CoinAmount(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<CoinAmount, E> {
                u64::try_from(value)
                    .map(CoinAmount)
                    .map_err(|_| E::custom("amounts cannot be negative"))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<CoinAmount, E> {
                Err(E::custom(
                    "float amounts lose precision, quote them like \"1.5\"",
                ))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<CoinAmount, E> {
                parse_coins(value).map(CoinAmount).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Parse a decimal coin string ("1", "1.5", "0.025") into atomic units.
fn parse_coins(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty amount".to_string());
    }
    let (whole, frac) = match raw.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (raw, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("invalid amount {raw:?}"));
    }
    if frac.len() > COIN_DECIMALS as usize {
        return Err(format!(
            "amount {raw:?} has more than {COIN_DECIMALS} decimal places"
        ));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("invalid amount {raw:?}"))?
    };
    let frac_atomic: u64 = if frac.is_empty() {
        0
    } else {
        let digits: u64 = frac
            .parse()
            .map_err(|_| format!("invalid amount {raw:?}"))?;
        digits * 10u64.pow(COIN_DECIMALS as u32 - frac.len() as u32)
    };

    whole
        .checked_mul(COIN_VALUE)
        .and_then(|atomic| atomic.checked_add(frac_atomic))
        .ok_or_else(|| format!("amount {raw:?} overflows"))
}

/// Failure kind a step may require, mirroring the harness taxonomy tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedFailure {
    InsufficientValue,
    Unauthorized,
    NothingToWithdraw,
    ConfirmationTimeout,
    OutOfRange,
    ReconciliationMismatch,
    Reverted,
    StateMismatch,
}

impl ExpectedFailure {
    pub fn tag(self) -> &'static str {
        match self {
            ExpectedFailure::InsufficientValue => "insufficient_value",
            ExpectedFailure::Unauthorized => "unauthorized",
            ExpectedFailure::NothingToWithdraw => "nothing_to_withdraw",
            ExpectedFailure::ConfirmationTimeout => "confirmation_timeout",
            ExpectedFailure::OutOfRange => "out_of_range",
            ExpectedFailure::ReconciliationMismatch => "reconciliation_mismatch",
            ExpectedFailure::Reverted => "reverted",
            ExpectedFailure::StateMismatch => "state_mismatch",
        }
    }

    pub fn matches(self, err: &HarnessError) -> bool {
        self.tag() == err.kind()
    }
}

/// End-of-scenario invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    /// Reconcile every successful withdrawal in the scenario.
    Conservation,
    /// The vault must end the scenario drained.
    TargetDrained,
    /// Account balances, vault balances and fees must sum to minted supply.
    TotalSupply,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorSpec {
    pub name: String,
    /// Genesis balance; defaults to 100 coins when omitted.
    #[serde(default)]
    pub balance: Option<CoinAmount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Genesis {
    /// Actor the vault is deployed for; must appear in `actors`.
    pub owner: String,
    pub actors: Vec<ActorSpec>,
    #[serde(default)]
    pub gas_price: Option<u64>,
    #[serde(default)]
    pub confirmation_delay_ms: Option<u64>,
    #[serde(default)]
    pub confirmation_bound_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Fund {
        actor: String,
        value: CoinAmount,
        #[serde(default)]
        expect: Option<ExpectedFailure>,
    },
    Withdraw {
        actor: String,
        #[serde(default)]
        expect: Option<ExpectedFailure>,
    },
    /// Withdraw with an explicit conservation check around it.
    Settle { actor: String },
    AssertFunded { actor: String, value: CoinAmount },
    AssertVaultBalance { value: CoinAmount },
}

impl Step {
    /// Actor the step acts as, when it has one.
    pub fn actor(&self) -> Option<&str> {
        match self {
            Step::Fund { actor, .. }
            | Step::Withdraw { actor, .. }
            | Step::Settle { actor }
            | Step::AssertFunded { actor, .. } => Some(actor),
            Step::AssertVaultBalance { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub genesis: Genesis,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub invariants: Vec<Invariant>,
}

impl Scenario {
    pub fn checks(&self, invariant: Invariant) -> bool {
        self.invariants.contains(&invariant)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("scenario name is empty");
        }
        if self.genesis.actors.is_empty() {
            bail!("scenario {:?} declares no actors", self.name);
        }
        if self.steps.is_empty() {
            bail!("scenario {:?} declares no steps", self.name);
        }

        let mut names = HashSet::new();
        for actor in &self.genesis.actors {
            if actor.name.trim().is_empty() {
                bail!("scenario {:?} has an actor with an empty name", self.name);
            }
            if !names.insert(actor.name.as_str()) {
                bail!(
                    "scenario {:?} declares actor {:?} twice",
                    self.name,
                    actor.name
                );
            }
        }
        if !names.contains(self.genesis.owner.as_str()) {
            bail!(
                "scenario {:?} names owner {:?} but never declares it",
                self.name,
                self.genesis.owner
            );
        }
        for (idx, step) in self.steps.iter().enumerate() {
            if let Some(actor) = step.actor() {
                if !names.contains(actor) {
                    bail!(
                        "step {} of scenario {:?} references unknown actor {:?}",
                        idx + 1,
                        self.name,
                        actor
                    );
                }
            }
        }
        if let Some(gas_price) = self.genesis.gas_price {
            if gas_price == 0 || gas_price > MAX_SCENARIO_GAS_PRICE {
                bail!(
                    "scenario {:?} gas price {} outside 1..={}",
                    self.name,
                    gas_price,
                    MAX_SCENARIO_GAS_PRICE
                );
            }
        }
        Ok(())
    }
}

/// Parse and validate a YAML scenario.
pub fn parse_scenario(yaml: &str) -> Result<Scenario> {
    let scenario: Scenario = serde_yaml::from_str(yaml).context("invalid scenario YAML")?;
    scenario.validate()?;
    Ok(scenario)
}

/// Read, parse and validate a scenario file.
pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    parse_scenario(&yaml).with_context(|| format!("in scenario {}", path.display()))
}
