//! The verification harness: submits actions with a confirmation bound,
//! classifies reverts into the failure taxonomy, verifies post-state and
//! checks conservation.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reckon_common::config::{REASON_NOTHING_TO_WITHDRAW, REASON_NOT_OWNER, REASON_VALUE_TOO_LOW};
use reckon_common::crypto::Address;
use reckon_common::transaction::TransactionOutcome;

use crate::error::HarnessError;
use crate::invariants;
use crate::target::{Actor, BalanceSnapshot, BalanceSource, FundingTarget};

/// Result of a verified owner withdrawal: the receipt plus the snapshots
/// the conservation check ran over.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub outcome: TransactionOutcome,
    pub before: BalanceSnapshot,
    pub after: BalanceSnapshot,
}

impl Settlement {
    /// Owner balance movement across the withdrawal, fee included.
    pub fn owner_gain(&self) -> i128 {
        self.after.owner as i128 - self.before.owner as i128
    }
}

/// Drives actions against a [`FundingTarget`] and turns raw outcomes into
/// verified results.
///
/// One harness serves one scenario at a time; actions are awaited to
/// confirmation before any post-state read, so balance reads never race
/// pending transactions.
pub struct LedgerHarness {
    balances: Arc<dyn BalanceSource>,
    confirmation_bound: Duration,
}

impl LedgerHarness {
    pub fn new(balances: Arc<dyn BalanceSource>, confirmation_bound: Duration) -> Self {
        Self {
            balances,
            confirmation_bound,
        }
    }

    pub fn confirmation_bound(&self) -> Duration {
        self.confirmation_bound
    }

    /// Fund the target and verify the credited state.
    ///
    /// # Errors
    ///
    /// [`HarnessError::InsufficientValue`] when the target rejected the
    /// value, [`HarnessError::ConfirmationTimeout`] when confirmation
    /// outran the bound, [`HarnessError::StateMismatch`] when the
    /// transaction confirmed but the target state moved by anything other
    /// than `value`.
    pub async fn fund(
        &self,
        actor: &Actor,
        target: &dyn FundingTarget,
        value: u64,
    ) -> Result<TransactionOutcome, HarnessError> {
        let funded_before = target.amount_funded(&actor.address()).await?;
        let balance_before = self.balances.balance_of(&target.address()).await?;

        let outcome = self.confirmed(target.fund(actor, value)).await?;
        if let Some(reason) = outcome.revert_reason() {
            return Err(self.classify_fund_revert(reason, value, target.minimum_value()));
        }

        let funded_after = target.amount_funded(&actor.address()).await?;
        let balance_after = self.balances.balance_of(&target.address()).await?;
        if funded_after as u128 != funded_before as u128 + value as u128 {
            return Err(HarnessError::StateMismatch {
                detail: format!(
                    "funded amount for {} moved {} -> {}, expected +{}",
                    actor.label(),
                    funded_before,
                    funded_after,
                    value
                ),
            });
        }
        if balance_after as u128 != balance_before as u128 + value as u128 {
            return Err(HarnessError::StateMismatch {
                detail: format!(
                    "target balance moved {} -> {}, expected +{}",
                    balance_before, balance_after, value
                ),
            });
        }

        log::info!(
            "{} funded {} (value {}, fee {})",
            actor.label(),
            target.address(),
            value,
            outcome.fee()
        );
        Ok(outcome)
    }

    /// Withdraw as `actor` and verify the target drained.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Unauthorized`] for a non-owner,
    /// [`HarnessError::NothingToWithdraw`] for an empty target,
    /// [`HarnessError::StateMismatch`] when the drain left residue.
    pub async fn withdraw(
        &self,
        actor: &Actor,
        target: &dyn FundingTarget,
    ) -> Result<TransactionOutcome, HarnessError> {
        let contributors = self.contributors(target).await?;

        let outcome = self.confirmed(target.withdraw(actor)).await?;
        if let Some(reason) = outcome.revert_reason() {
            return Err(self.classify_withdraw_revert(reason, actor));
        }

        invariants::target_drained(self.balances.as_ref(), target, &contributors).await?;
        log::info!(
            "{} drained {} ({} funder records cleared, fee {})",
            actor.label(),
            target.address(),
            contributors.len(),
            outcome.fee()
        );
        Ok(outcome)
    }

    /// Owner and target balances at current confirmed state.
    pub async fn snapshot(
        &self,
        target: &dyn FundingTarget,
    ) -> Result<BalanceSnapshot, HarnessError> {
        Ok(BalanceSnapshot {
            owner: self.balances.balance_of(&target.owner()).await?,
            target: self.balances.balance_of(&target.address()).await?,
        })
    }

    /// Conservation check: `before.target + before.owner` must equal
    /// `after.owner + fees`.
    pub fn reconcile(
        &self,
        before: &BalanceSnapshot,
        after: &BalanceSnapshot,
        fees: u64,
    ) -> Result<(), HarnessError> {
        invariants::conservation(before, after, fees)
    }

    /// Snapshot, withdraw, snapshot again and reconcile in one sequence.
    pub async fn settle(
        &self,
        owner: &Actor,
        target: &dyn FundingTarget,
    ) -> Result<Settlement, HarnessError> {
        let before = self.snapshot(target).await?;
        let outcome = self.withdraw(owner, target).await?;
        let after = self.snapshot(target).await?;
        self.reconcile(&before, &after, outcome.fee())?;
        log::info!(
            "Settled {}: owner {} -> {} (fee {})",
            target.address(),
            before.owner,
            after.owner,
            outcome.fee()
        );
        Ok(Settlement {
            outcome,
            before,
            after,
        })
    }

    /// Funder addresses in first-contribution order, walked through the
    /// target's indexed accessor.
    pub async fn contributors(
        &self,
        target: &dyn FundingTarget,
    ) -> Result<Vec<Address>, HarnessError> {
        let mut found = Vec::new();
        loop {
            match target.funder(found.len()).await {
                Ok(address) => found.push(address),
                Err(HarnessError::OutOfRange { .. }) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    async fn confirmed(
        &self,
        submission: impl Future<Output = Result<TransactionOutcome, HarnessError>>,
    ) -> Result<TransactionOutcome, HarnessError> {
        match tokio::time::timeout(self.confirmation_bound, submission).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::ConfirmationTimeout {
                bound: self.confirmation_bound,
            }),
        }
    }

    fn classify_fund_revert(&self, reason: &str, value: u64, minimum: u64) -> HarnessError {
        if reason == REASON_VALUE_TOO_LOW {
            HarnessError::InsufficientValue { value, minimum }
        } else {
            HarnessError::Reverted {
                reason: reason.to_string(),
            }
        }
    }

    fn classify_withdraw_revert(&self, reason: &str, actor: &Actor) -> HarnessError {
        match reason {
            REASON_NOT_OWNER => HarnessError::Unauthorized {
                actor: actor.label().to_string(),
            },
            REASON_NOTHING_TO_WITHDRAW => HarnessError::NothingToWithdraw,
            other => HarnessError::Reverted {
                reason: other.to_string(),
            },
        }
    }
}
