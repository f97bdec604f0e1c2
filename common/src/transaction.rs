use serde::{Deserialize, Serialize};

use crate::crypto::TxHash;

/// Terminal status of a submitted transaction.
///
/// A revert is not a transport failure: the transaction was accepted,
/// consumed gas up to the rejection point and changed no other state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ExecutionStatus {
    Success,
    Reverted(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            ExecutionStatus::Success => None,
            ExecutionStatus::Reverted(reason) => Some(reason),
        }
    }
}

/// Receipt for a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub hash: TxHash,
    #[serde(flatten)]
    pub status: ExecutionStatus,
    pub gas_used: u64,
    pub effective_gas_price: u64,
}

impl TransactionOutcome {
    pub fn success(hash: TxHash, gas_used: u64, effective_gas_price: u64) -> Self {
        Self {
            hash,
            status: ExecutionStatus::Success,
            gas_used,
            effective_gas_price,
        }
    }

    pub fn reverted(
        hash: TxHash,
        reason: impl Into<String>,
        gas_used: u64,
        effective_gas_price: u64,
    ) -> Self {
        Self {
            hash,
            status: ExecutionStatus::Reverted(reason.into()),
            gas_used,
            effective_gas_price,
        }
    }

    // Fee cost charged to the sender, paid on success and revert alike
    pub fn fee(&self) -> u64 {
        self.gas_used * self.effective_gas_price
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn revert_reason(&self) -> Option<&str> {
        self.status.revert_reason()
    }
}
