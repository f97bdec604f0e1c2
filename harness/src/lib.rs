//! Ledger verification harness.
//!
//! Drives fund/withdraw sequences against a balance-bearing target,
//! captures pre/post balances and fee costs, and checks that value is
//! conserved net of fees. Targets are reached through the [`FundingTarget`]
//! trait; an in-memory chain with a funding vault ships in [`chain`] so
//! scenarios run deterministically without any external node.
//!
//! Typical flow: build a [`chain::SimChain`] with funded actors, deploy a
//! vault for the owner, wrap the chain in a [`LedgerHarness`] and either
//! call the operations directly or run a YAML scenario through
//! [`scenario::ScenarioExecutor`].

pub mod artifacts;
pub mod chain;
pub mod clock;
pub mod error;
pub mod harness;
pub mod invariants;
pub mod rng;
pub mod scenario;
pub mod target;

pub use chain::{SimChain, SimChainBuilder};
pub use error::HarnessError;
pub use harness::{LedgerHarness, Settlement};
pub use target::{Actor, BalanceSnapshot, BalanceSource, FundingTarget};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
