use thiserror::Error;

use crate::crypto::Address;

// Chain-level bookkeeping failures. Rejections that a real transaction
// would express as a revert are not errors at this layer; they travel as
// a reverted status on the outcome instead.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown account: {address}")]
    UnknownAccount { address: Address },

    #[error("Unknown vault: {address}")]
    UnknownVault { address: Address },

    #[error("Duplicate account: {address}")]
    DuplicateAccount { address: Address },

    #[error("Supply cap exceeded: minted {minted}, requested {requested}, cap {cap}")]
    SupplyExceeded {
        minted: u64,
        requested: u64,
        cap: u64,
    },

    #[error("Insufficient balance for {address}: need {need}, have {have}")]
    InsufficientBalance {
        address: Address,
        need: u64,
        have: u64,
    },

    #[error("Balance overflow")]
    Overflow,
}
