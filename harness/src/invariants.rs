//! Economic invariant checks shared by the harness and the scenario
//! executor.

use reckon_common::crypto::Address;
use reckon_common::error::LedgerError;

use crate::chain::SimChain;
use crate::error::HarnessError;
use crate::target::{BalanceSnapshot, BalanceSource, FundingTarget};

/// Value conservation across a withdrawal, net of fees:
/// `before.target + before.owner == after.owner + fees`.
///
/// Funders are deliberately out of scope; multi-funder scenarios check
/// them through their mapping entries instead of their balances.
pub fn conservation(
    before: &BalanceSnapshot,
    after: &BalanceSnapshot,
    fees: u64,
) -> Result<(), HarnessError> {
    let expected = before
        .target
        .checked_add(before.owner)
        .ok_or(LedgerError::Overflow)?;
    let actual = after.owner.checked_add(fees).ok_or(LedgerError::Overflow)?;
    if expected != actual {
        return Err(HarnessError::ReconciliationMismatch { expected, actual });
    }
    Ok(())
}

/// Post-withdrawal drain check: zero balance, empty funder sequence and
/// zeroed mapping entries for every prior contributor.
pub async fn target_drained(
    balances: &dyn BalanceSource,
    target: &dyn FundingTarget,
    prior_contributors: &[Address],
) -> Result<(), HarnessError> {
    let balance = balances.balance_of(&target.address()).await?;
    if balance != 0 {
        return Err(HarnessError::StateMismatch {
            detail: format!("target still holds {balance} after withdrawal"),
        });
    }

    match target.funder(0).await {
        Ok(address) => {
            return Err(HarnessError::StateMismatch {
                detail: format!("funder sequence not cleared, index 0 is {address}"),
            })
        }
        Err(HarnessError::OutOfRange { .. }) => {}
        Err(err) => return Err(err),
    }

    for contributor in prior_contributors {
        let funded = target.amount_funded(contributor).await?;
        if funded != 0 {
            return Err(HarnessError::StateMismatch {
                detail: format!("mapping entry for {contributor} still reads {funded}"),
            });
        }
    }
    Ok(())
}

/// Chain-wide supply conservation: account balances, vault balances and
/// accumulated fees must sum to the minted supply.
pub fn total_supply(chain: &SimChain) -> Result<(), HarnessError> {
    let supply = chain.supply()?;
    let actual = supply
        .accounts
        .checked_add(supply.vaults)
        .and_then(|sum| sum.checked_add(supply.fees))
        .ok_or(LedgerError::Overflow)?;
    if actual != supply.minted {
        return Err(HarnessError::ReconciliationMismatch {
            expected: supply.minted,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservation_accepts_exact_books() {
        let before = BalanceSnapshot {
            owner: 1_000,
            target: 500,
        };
        let after = BalanceSnapshot {
            owner: 1_450,
            target: 0,
        };
        conservation(&before, &after, 50).unwrap();
    }

    #[test]
    fn conservation_reports_the_numbers() {
        let before = BalanceSnapshot {
            owner: 1_000,
            target: 500,
        };
        let after = BalanceSnapshot {
            owner: 1_449,
            target: 0,
        };
        let err = conservation(&before, &after, 50).unwrap_err();
        match err {
            HarnessError::ReconciliationMismatch { expected, actual } => {
                assert_eq!(expected, 1_500);
                assert_eq!(actual, 1_499);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn conservation_rejects_overflowing_books() {
        let before = BalanceSnapshot {
            owner: u64::MAX,
            target: 1,
        };
        let after = BalanceSnapshot {
            owner: 0,
            target: 0,
        };
        assert!(conservation(&before, &after, 0).is_err());
    }

    #[tokio::test]
    async fn total_supply_holds_on_a_fresh_chain() {
        let chain = SimChain::builder()
            .with_funded_actor("owner", 1_000)
            .with_funded_actor("alice", 500)
            .build()
            .unwrap();
        total_supply(&chain).unwrap();
    }
}
