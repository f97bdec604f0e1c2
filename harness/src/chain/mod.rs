//! Deterministic in-memory chain used to exercise the harness.
//!
//! One shared ledger of account balances plus any number of deployed
//! funding vaults. Submissions confirm after a configurable delay driven
//! by the injected [`Clock`], so paused-time tests settle instantly while
//! still observing a real pending window. Fees are charged on success and
//! revert alike and land in a fee accumulator, which keeps total supply
//! checkable at every step.

pub mod vault;

pub use vault::{PriceFeed, TargetPhase, VaultHandle};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::time::Duration;

use reckon_common::config::{
    DEFAULT_CONFIRMATION_DELAY_MS, DEFAULT_GAS_PRICE, GAS_FUND, GAS_REVERT, GAS_WITHDRAW_BASE,
    GAS_WITHDRAW_PER_FUNDER, MAXIMUM_SUPPLY, REASON_NOTHING_TO_WITHDRAW, REASON_NOT_OWNER,
    REASON_VALUE_TOO_LOW,
};
use reckon_common::crypto::{hash, Address, TxHash};
use reckon_common::error::LedgerError;
use reckon_common::transaction::TransactionOutcome;

use crate::clock::{Clock, SystemClock};
use crate::error::HarnessError;
use crate::target::{Actor, BalanceSource};
use vault::{VaultState, DEFAULT_FEED_ANSWER};

/// What a submitted transaction asks the chain to do.
#[derive(Debug, Clone)]
enum Action {
    Fund { vault: Address, value: u64 },
    Withdraw { vault: Address },
}

#[derive(Default)]
struct ChainState {
    balances: HashMap<Address, u64>,
    vaults: HashMap<Address, VaultState>,
    feeds: HashMap<Address, u64>,
    collected_fees: u64,
    minted_supply: u64,
    tx_counter: u64,
    deploy_counter: u64,
}

/// Point-in-time supply accounting, used by the total-supply invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplySnapshot {
    pub accounts: u64,
    pub vaults: u64,
    pub fees: u64,
    pub minted: u64,
}

/// Shared in-memory chain. Cloning is cheap and clones observe the same
/// state.
#[derive(Clone)]
pub struct SimChain {
    state: Arc<RwLock<ChainState>>,
    clock: Arc<dyn Clock>,
    gas_price: u64,
    confirmation_delay: Duration,
}

impl SimChain {
    pub fn builder() -> SimChainBuilder {
        SimChainBuilder::new()
    }

    pub fn gas_price(&self) -> u64 {
        self.gas_price
    }

    pub fn confirmation_delay(&self) -> Duration {
        self.confirmation_delay
    }

    /// Mint `amount` to a new actor named `label`.
    pub fn register_actor(
        &self,
        label: impl Into<String>,
        amount: u64,
    ) -> Result<Actor, HarnessError> {
        let actor = Actor::new(label);
        let mut state = self.state.write();
        if state.balances.contains_key(&actor.address()) {
            return Err(LedgerError::DuplicateAccount {
                address: actor.address(),
            }
            .into());
        }
        let minted = state
            .minted_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        if minted > MAXIMUM_SUPPLY {
            return Err(LedgerError::SupplyExceeded {
                requested: amount,
                minted: state.minted_supply,
                cap: MAXIMUM_SUPPLY,
            }
            .into());
        }
        state.minted_supply = minted;
        state.balances.insert(actor.address(), amount);
        log::debug!("Registered actor {} at {}", actor.label(), actor.address());
        Ok(actor)
    }

    /// Look up a previously registered actor by label.
    pub fn actor(&self, label: &str) -> Result<Actor, HarnessError> {
        let actor = Actor::new(label);
        if self.state.read().balances.contains_key(&actor.address()) {
            Ok(actor)
        } else {
            Err(LedgerError::UnknownAccount {
                address: actor.address(),
            }
            .into())
        }
    }

    /// Deploy a standalone price feed holding a fixed answer.
    pub fn deploy_price_feed(&self, answer: NonZeroU64) -> PriceFeed {
        let mut state = self.state.write();
        let address = deploy_address(b"feed", state.deploy_counter);
        state.deploy_counter += 1;
        state.feeds.insert(address, answer.get());
        log::debug!("Deployed price feed {} answering {}", address, answer);
        PriceFeed::new(address, answer)
    }

    /// Deploy a fresh vault owned by `owner`, wired to a new feed with the
    /// default answer. Call once per scenario.
    pub fn deploy_vault(&self, owner: &Actor) -> Result<VaultHandle, HarnessError> {
        let feed = self.deploy_price_feed(DEFAULT_FEED_ANSWER);
        self.deploy_vault_with_feed(owner, &feed)
    }

    /// Deploy a fresh vault reading its minimum from an existing feed.
    pub fn deploy_vault_with_feed(
        &self,
        owner: &Actor,
        feed: &PriceFeed,
    ) -> Result<VaultHandle, HarnessError> {
        let mut state = self.state.write();
        if !state.balances.contains_key(&owner.address()) {
            return Err(LedgerError::UnknownAccount {
                address: owner.address(),
            }
            .into());
        }
        let address = deploy_address(b"vault", state.deploy_counter);
        state.deploy_counter += 1;

        let vault = VaultState::new(owner.address(), feed);
        let minimum = vault.minimum_value();
        state.vaults.insert(address, vault);
        log::info!(
            "Deployed vault {} owned by {} (minimum {})",
            address,
            owner.label(),
            minimum
        );
        Ok(VaultHandle::new(
            self.clone(),
            address,
            owner.address(),
            feed.address(),
            minimum,
        ))
    }

    /// Answer held by a deployed price feed.
    pub fn feed_answer(&self, address: &Address) -> Option<u64> {
        self.state.read().feeds.get(address).copied()
    }

    /// Balance of any address at confirmed state; 0 when never seen.
    pub fn balance(&self, address: &Address) -> u64 {
        let state = self.state.read();
        if let Some(balance) = state.balances.get(address) {
            *balance
        } else if let Some(vault) = state.vaults.get(address) {
            vault.balance()
        } else {
            0
        }
    }

    pub fn collected_fees(&self) -> u64 {
        self.state.read().collected_fees
    }

    pub fn minted_supply(&self) -> u64 {
        self.state.read().minted_supply
    }

    /// Sum account balances, vault balances and fees with overflow checks.
    pub fn supply(&self) -> Result<SupplySnapshot, HarnessError> {
        let state = self.state.read();
        let mut accounts: u64 = 0;
        for balance in state.balances.values() {
            accounts = accounts.checked_add(*balance).ok_or(LedgerError::Overflow)?;
        }
        let mut vaults: u64 = 0;
        for vault in state.vaults.values() {
            vaults = vaults.checked_add(vault.balance()).ok_or(LedgerError::Overflow)?;
        }
        Ok(SupplySnapshot {
            accounts,
            vaults,
            fees: state.collected_fees,
            minted: state.minted_supply,
        })
    }

    pub(crate) fn with_vault<R>(
        &self,
        address: &Address,
        f: impl FnOnce(&VaultState) -> R,
    ) -> Result<R, LedgerError> {
        let state = self.state.read();
        let vault = state
            .vaults
            .get(address)
            .ok_or(LedgerError::UnknownVault { address: *address })?;
        Ok(f(vault))
    }

    /// Submit an action and resolve once it confirms. The pending window
    /// between submission and confirmation is a clock sleep; reads issued
    /// inside it observe pre-state.
    async fn execute(
        &self,
        sender: Address,
        action: Action,
    ) -> Result<TransactionOutcome, LedgerError> {
        let tx = {
            let mut state = self.state.write();
            if !state.balances.contains_key(&sender) {
                return Err(LedgerError::UnknownAccount { address: sender });
            }
            state.tx_counter += 1;
            tx_hash(state.tx_counter, &sender, &action)
        };
        log::debug!("Submitted {tx} ({action:?})");

        self.clock.sleep(self.confirmation_delay).await;

        let mut state = self.state.write();
        let outcome = match action {
            Action::Fund { vault, value } => self.apply_fund(&mut state, tx, sender, vault, value),
            Action::Withdraw { vault } => self.apply_withdraw(&mut state, tx, sender, vault),
        }?;
        log::debug!(
            "Confirmed {} (gas {}, fee {})",
            outcome.hash,
            outcome.gas_used,
            outcome.fee()
        );
        Ok(outcome)
    }

    fn apply_fund(
        &self,
        state: &mut ChainState,
        tx: TxHash,
        sender: Address,
        vault_addr: Address,
        value: u64,
    ) -> Result<TransactionOutcome, LedgerError> {
        let minimum = state
            .vaults
            .get(&vault_addr)
            .ok_or(LedgerError::UnknownVault {
                address: vault_addr,
            })?
            .minimum_value();

        if value < minimum {
            let outcome =
                TransactionOutcome::reverted(tx, REASON_VALUE_TOO_LOW, GAS_REVERT, self.gas_price);
            charge(state, &sender, outcome.fee())?;
            return Ok(outcome);
        }

        let outcome = TransactionOutcome::success(tx, GAS_FUND, self.gas_price);
        let need = value
            .checked_add(outcome.fee())
            .ok_or(LedgerError::Overflow)?;
        debit(state, &sender, need)?;
        state.collected_fees = state
            .collected_fees
            .checked_add(outcome.fee())
            .ok_or(LedgerError::Overflow)?;

        let vault = state
            .vaults
            .get_mut(&vault_addr)
            .ok_or(LedgerError::UnknownVault {
                address: vault_addr,
            })?;
        vault.credit(sender, value)?;
        Ok(outcome)
    }

    fn apply_withdraw(
        &self,
        state: &mut ChainState,
        tx: TxHash,
        sender: Address,
        vault_addr: Address,
    ) -> Result<TransactionOutcome, LedgerError> {
        let (owner, vault_balance, funders) = {
            let vault = state
                .vaults
                .get(&vault_addr)
                .ok_or(LedgerError::UnknownVault {
                    address: vault_addr,
                })?;
            (vault.owner(), vault.balance(), vault.funder_count())
        };

        if sender != owner {
            let outcome =
                TransactionOutcome::reverted(tx, REASON_NOT_OWNER, GAS_REVERT, self.gas_price);
            charge(state, &sender, outcome.fee())?;
            return Ok(outcome);
        }
        if vault_balance == 0 {
            let outcome = TransactionOutcome::reverted(
                tx,
                REASON_NOTHING_TO_WITHDRAW,
                GAS_REVERT,
                self.gas_price,
            );
            charge(state, &sender, outcome.fee())?;
            return Ok(outcome);
        }

        // Clearing funder records costs gas per entry
        let gas = GAS_WITHDRAW_BASE + GAS_WITHDRAW_PER_FUNDER * funders as u64;
        let outcome = TransactionOutcome::success(tx, gas, self.gas_price);
        let fee = outcome.fee();

        // Credit the drained balance before debiting the fee, so an owner
        // whose own balance is below the fee can still settle from it
        let owner_balance = state
            .balances
            .get_mut(&owner)
            .ok_or(LedgerError::UnknownAccount { address: owner })?;
        let credited = owner_balance
            .checked_add(vault_balance)
            .ok_or(LedgerError::Overflow)?;
        let remaining = credited
            .checked_sub(fee)
            .ok_or(LedgerError::InsufficientBalance {
                address: owner,
                need: fee,
                have: credited,
            })?;
        *owner_balance = remaining;
        state.collected_fees = state
            .collected_fees
            .checked_add(fee)
            .ok_or(LedgerError::Overflow)?;

        let vault = state
            .vaults
            .get_mut(&vault_addr)
            .ok_or(LedgerError::UnknownVault {
                address: vault_addr,
            })?;
        vault.drain();
        Ok(outcome)
    }

    pub(crate) async fn submit_fund(
        &self,
        sender: Address,
        vault: Address,
        value: u64,
    ) -> Result<TransactionOutcome, LedgerError> {
        self.execute(sender, Action::Fund { vault, value }).await
    }

    pub(crate) async fn submit_withdraw(
        &self,
        sender: Address,
        vault: Address,
    ) -> Result<TransactionOutcome, LedgerError> {
        self.execute(sender, Action::Withdraw { vault }).await
    }
}

#[async_trait]
impl BalanceSource for SimChain {
    async fn balance_of(&self, address: &Address) -> Result<u64, HarnessError> {
        Ok(self.balance(address))
    }
}

fn debit(state: &mut ChainState, address: &Address, amount: u64) -> Result<(), LedgerError> {
    let balance = state
        .balances
        .get_mut(address)
        .ok_or(LedgerError::UnknownAccount { address: *address })?;
    *balance = balance
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientBalance {
            address: *address,
            need: amount,
            have: *balance,
        })?;
    Ok(())
}

// Charge a fee that goes to the accumulator, used on revert paths
fn charge(state: &mut ChainState, address: &Address, fee: u64) -> Result<(), LedgerError> {
    debit(state, address, fee)?;
    state.collected_fees = state
        .collected_fees
        .checked_add(fee)
        .ok_or(LedgerError::Overflow)?;
    Ok(())
}

fn deploy_address(kind: &[u8], counter: u64) -> Address {
    let mut data = Vec::with_capacity(kind.len() + 8);
    data.extend_from_slice(kind);
    data.extend_from_slice(&counter.to_le_bytes());
    Address::derive(&data)
}

fn tx_hash(counter: u64, sender: &Address, action: &Action) -> TxHash {
    let mut data = Vec::with_capacity(8 + 20 + 9);
    data.extend_from_slice(&counter.to_le_bytes());
    data.extend_from_slice(sender.as_bytes());
    match action {
        Action::Fund { value, .. } => {
            data.push(0);
            data.extend_from_slice(&value.to_le_bytes());
        }
        Action::Withdraw { .. } => data.push(1),
    }
    hash(&data)
}

/// Builds a [`SimChain`] with its genesis allocation.
pub struct SimChainBuilder {
    clock: Arc<dyn Clock>,
    gas_price: u64,
    confirmation_delay: Duration,
    genesis: Vec<(String, u64)>,
}

impl SimChainBuilder {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            gas_price: DEFAULT_GAS_PRICE,
            confirmation_delay: Duration::from_millis(DEFAULT_CONFIRMATION_DELAY_MS),
            genesis: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// Add a genesis actor; retrieve it after build with [`SimChain::actor`].
    pub fn with_funded_actor(mut self, label: impl Into<String>, amount: u64) -> Self {
        self.genesis.push((label.into(), amount));
        self
    }

    pub fn build(self) -> Result<SimChain, HarnessError> {
        let chain = SimChain {
            state: Arc::new(RwLock::new(ChainState::default())),
            clock: self.clock,
            gas_price: self.gas_price,
            confirmation_delay: self.confirmation_delay,
        };
        for (label, amount) in self.genesis {
            chain.register_actor(label, amount)?;
        }
        Ok(chain)
    }
}

impl Default for SimChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
