//! The simulated funding vault: minimum-value gated contributions,
//! owner-only drain, funder records in first-contribution order.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::fmt;
use std::num::NonZeroU64;

use reckon_common::config::{COIN_VALUE, INITIAL_FEED_ANSWER, MINIMUM_NOTIONAL};
use reckon_common::crypto::Address;
use reckon_common::error::LedgerError;
use reckon_common::transaction::TransactionOutcome;

use super::SimChain;
use crate::error::HarnessError;
use crate::target::{Actor, FundingTarget};

pub const DEFAULT_FEED_ANSWER: NonZeroU64 = match NonZeroU64::new(INITIAL_FEED_ANSWER) {
    Some(answer) => answer,
    None => panic!("default feed answer must be non-zero"),
};

/// Atomic minimum derived from a feed answer. Never 0, so zero-value
/// funding is always rejected.
pub fn minimum_for(answer: NonZeroU64) -> u64 {
    let minimum = MINIMUM_NOTIONAL as u128 * COIN_VALUE as u128 / answer.get() as u128;
    (minimum as u64).max(1)
}

/// Deployed price feed with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct PriceFeed {
    address: Address,
    answer: NonZeroU64,
}

impl PriceFeed {
    pub(crate) fn new(address: Address, answer: NonZeroU64) -> Self {
        Self { address, answer }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn answer(&self) -> u64 {
        self.answer.get()
    }

    pub(crate) fn nonzero_answer(&self) -> NonZeroU64 {
        self.answer
    }
}

/// Funding cycle position: contributions so far, or nothing held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Empty,
    Funded(usize),
}

impl fmt::Display for TargetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPhase::Empty => write!(f, "Empty"),
            TargetPhase::Funded(n) => write!(f, "Funded({n})"),
        }
    }
}

/// On-chain vault storage.
pub struct VaultState {
    owner: Address,
    price_feed: Address,
    feed_answer: u64,
    minimum_value: u64,
    balance: u64,
    // Key order is first-contribution order; repeat funders only grow
    // their existing entry
    records: IndexMap<Address, u64>,
}

impl VaultState {
    pub(crate) fn new(owner: Address, feed: &PriceFeed) -> Self {
        Self {
            owner,
            price_feed: feed.address(),
            feed_answer: feed.answer(),
            minimum_value: minimum_for(feed.nonzero_answer()),
            balance: 0,
            records: IndexMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn price_feed(&self) -> Address {
        self.price_feed
    }

    pub fn feed_answer(&self) -> u64 {
        self.feed_answer
    }

    pub fn minimum_value(&self) -> u64 {
        self.minimum_value
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn funder_count(&self) -> usize {
        self.records.len()
    }

    pub fn funder_at(&self, index: usize) -> Option<Address> {
        self.records.get_index(index).map(|(address, _)| *address)
    }

    pub fn amount_funded(&self, address: &Address) -> u64 {
        self.records.get(address).copied().unwrap_or(0)
    }

    pub fn phase(&self) -> TargetPhase {
        if self.balance == 0 && self.records.is_empty() {
            TargetPhase::Empty
        } else {
            TargetPhase::Funded(self.records.len())
        }
    }

    pub(crate) fn credit(&mut self, from: Address, value: u64) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(value)
            .ok_or(LedgerError::Overflow)?;
        let entry = self.records.entry(from).or_insert(0);
        *entry = entry.checked_add(value).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub(crate) fn drain(&mut self) {
        self.balance = 0;
        self.records.clear();
    }
}

/// Client-side handle to a deployed vault. Deployment-immutable fields are
/// cached on the handle; balances and funder records are read live.
#[derive(Clone)]
pub struct VaultHandle {
    chain: SimChain,
    address: Address,
    owner: Address,
    price_feed: Address,
    minimum_value: u64,
}

impl VaultHandle {
    pub(crate) fn new(
        chain: SimChain,
        address: Address,
        owner: Address,
        price_feed: Address,
        minimum_value: u64,
    ) -> Self {
        Self {
            chain,
            address,
            owner,
            price_feed,
            minimum_value,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn price_feed(&self) -> Address {
        self.price_feed
    }

    pub fn minimum_value(&self) -> u64 {
        self.minimum_value
    }

    pub fn balance(&self) -> u64 {
        self.chain.balance(&self.address)
    }

    pub fn phase(&self) -> Result<TargetPhase, HarnessError> {
        Ok(self.chain.with_vault(&self.address, |vault| vault.phase())?)
    }

    pub fn funder_count(&self) -> Result<usize, HarnessError> {
        Ok(self
            .chain
            .with_vault(&self.address, |vault| vault.funder_count())?)
    }
}

#[async_trait]
impl FundingTarget for VaultHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn owner(&self) -> Address {
        self.owner
    }

    fn price_feed(&self) -> Address {
        self.price_feed
    }

    fn minimum_value(&self) -> u64 {
        self.minimum_value
    }

    async fn fund(&self, from: &Actor, value: u64) -> Result<TransactionOutcome, HarnessError> {
        Ok(self
            .chain
            .submit_fund(from.address(), self.address, value)
            .await?)
    }

    async fn withdraw(&self, from: &Actor) -> Result<TransactionOutcome, HarnessError> {
        Ok(self
            .chain
            .submit_withdraw(from.address(), self.address)
            .await?)
    }

    async fn funder(&self, index: usize) -> Result<Address, HarnessError> {
        let (found, len) = self
            .chain
            .with_vault(&self.address, |vault| {
                (vault.funder_at(index), vault.funder_count())
            })?;
        found.ok_or(HarnessError::OutOfRange { index, len })
    }

    async fn amount_funded(&self, address: &Address) -> Result<u64, HarnessError> {
        Ok(self
            .chain
            .with_vault(&self.address, |vault| vault.amount_funded(address))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(answer: u64) -> PriceFeed {
        PriceFeed::new(
            Address::derive(b"test-feed"),
            NonZeroU64::new(answer).unwrap(),
        )
    }

    #[test]
    fn minimum_matches_default_answer() {
        // 50 notional at 2000 notional per coin is 0.025 coin
        assert_eq!(minimum_for(DEFAULT_FEED_ANSWER), 2_500_000);
    }

    #[test]
    fn minimum_never_reaches_zero() {
        let answer = NonZeroU64::new(u64::MAX).unwrap();
        assert_eq!(minimum_for(answer), 1);
    }

    #[test]
    fn repeat_funders_grow_in_place() {
        let mut vault = VaultState::new(Address::derive(b"owner"), &feed(INITIAL_FEED_ANSWER));
        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");

        vault.credit(alice, 10).unwrap();
        vault.credit(bob, 20).unwrap();
        vault.credit(alice, 5).unwrap();

        assert_eq!(vault.funder_count(), 2);
        assert_eq!(vault.funder_at(0), Some(alice));
        assert_eq!(vault.funder_at(1), Some(bob));
        assert_eq!(vault.amount_funded(&alice), 15);
        assert_eq!(vault.balance(), 35);
        assert_eq!(vault.phase(), TargetPhase::Funded(2));
    }

    #[test]
    fn drain_resets_the_cycle() {
        let mut vault = VaultState::new(Address::derive(b"owner"), &feed(INITIAL_FEED_ANSWER));
        vault.credit(Address::derive(b"alice"), 10).unwrap();

        vault.drain();

        assert_eq!(vault.balance(), 0);
        assert_eq!(vault.funder_count(), 0);
        assert_eq!(vault.funder_at(0), None);
        assert_eq!(vault.phase(), TargetPhase::Empty);
        assert_eq!(vault.amount_funded(&Address::derive(b"alice")), 0);
    }
}
