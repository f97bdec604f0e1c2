//! Actor identity and the seams through which the harness reaches the
//! system under test. Everything here is passed explicitly; no ambient
//! account registry exists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reckon_common::crypto::Address;
use reckon_common::transaction::TransactionOutcome;

use crate::error::HarnessError;

/// An identity able to submit actions.
///
/// The address is derived from the label, so actors are stable across
/// runs and scenario files can refer to them by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    label: String,
    address: Address,
}

impl Actor {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let address = Address::derive(label.as_bytes());
        Self { label, address }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

/// Owner and target balances read at the same confirmed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub owner: u64,
    pub target: u64,
}

/// The balance-bearing entity under test.
///
/// Submissions resolve once the transaction is confirmed; a revert is a
/// normal resolution carrying the reason on the outcome, not an `Err`.
/// `Err` is reserved for bookkeeping failures such as a sender that cannot
/// cover value plus fee.
#[async_trait]
pub trait FundingTarget: Send + Sync {
    fn address(&self) -> Address;

    /// Owner fixed at deployment.
    fn owner(&self) -> Address;

    /// Price feed the minimum-value policy is derived from.
    fn price_feed(&self) -> Address;

    /// Smallest accepted funding value in atomic units.
    fn minimum_value(&self) -> u64;

    /// Contribute `value` from `from`.
    async fn fund(&self, from: &Actor, value: u64) -> Result<TransactionOutcome, HarnessError>;

    /// Drain the whole balance to the owner.
    async fn withdraw(&self, from: &Actor) -> Result<TransactionOutcome, HarnessError>;

    /// Funder address at `index` in first-contribution order.
    ///
    /// # Errors
    ///
    /// [`HarnessError::OutOfRange`] past the end of the recorded sequence,
    /// including index 0 after a successful withdrawal.
    async fn funder(&self, index: usize) -> Result<Address, HarnessError>;

    /// Total contributed by `address` this cycle, 0 when unknown.
    async fn amount_funded(&self, address: &Address) -> Result<u64, HarnessError>;
}

/// Atomic balance reads at current confirmed state.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Balance of any address, 0 for addresses never seen.
    async fn balance_of(&self, address: &Address) -> Result<u64, HarnessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_address_is_stable() {
        let a = Actor::new("alice");
        let b = Actor::new("alice");
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), Actor::new("bob").address());
    }

    #[test]
    fn snapshot_serializes_flat() {
        let snap = BalanceSnapshot {
            owner: 10,
            target: 5,
        };
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["owner"], 10);
        assert_eq!(json["target"], 5);
    }
}
