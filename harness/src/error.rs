use std::time::Duration;
use thiserror::Error;

use reckon_common::error::LedgerError;

/// Scenario-facing failure taxonomy.
///
/// Revert classification keeps rejected transactions distinguishable from
/// transactions that confirmed but left the target in a state the driver
/// did not expect ([`HarnessError::StateMismatch`]).
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Funding value {value} below minimum {minimum}")]
    InsufficientValue { value: u64, minimum: u64 },

    #[error("Actor {actor} is not allowed to withdraw")]
    Unauthorized { actor: String },

    #[error("Funder index {index} out of range, {len} recorded")]
    OutOfRange { index: usize, len: usize },

    #[error("Transaction not confirmed within {bound:?}")]
    ConfirmationTimeout { bound: Duration },

    #[error("Conservation violated: expected {expected}, got {actual}")]
    ReconciliationMismatch { expected: u64, actual: u64 },

    #[error("Nothing to withdraw, vault is empty")]
    NothingToWithdraw,

    #[error("Transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("Confirmed with unexpected state: {detail}")]
    StateMismatch { detail: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl HarnessError {
    /// Stable tag used by scenario files to name an expected failure.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::InsufficientValue { .. } => "insufficient_value",
            HarnessError::Unauthorized { .. } => "unauthorized",
            HarnessError::OutOfRange { .. } => "out_of_range",
            HarnessError::ConfirmationTimeout { .. } => "confirmation_timeout",
            HarnessError::ReconciliationMismatch { .. } => "reconciliation_mismatch",
            HarnessError::NothingToWithdraw => "nothing_to_withdraw",
            HarnessError::Reverted { .. } => "reverted",
            HarnessError::StateMismatch { .. } => "state_mismatch",
            HarnessError::Ledger(_) => "ledger",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_numbers_for_diagnosis() {
        let err = HarnessError::InsufficientValue {
            value: 5,
            minimum: 10,
        };
        assert_eq!(err.to_string(), "Funding value 5 below minimum 10");

        let err = HarnessError::ReconciliationMismatch {
            expected: 100,
            actual: 90,
        };
        assert_eq!(err.to_string(), "Conservation violated: expected 100, got 90");
    }

    #[test]
    fn ledger_errors_pass_through() {
        let inner = LedgerError::Overflow;
        let err: HarnessError = inner.into();
        assert_eq!(err.to_string(), "Balance overflow");
        assert_eq!(err.kind(), "ledger");
    }
}
