mod address;
mod hash;

pub use address::{Address, ADDRESS_SIZE};
pub use hash::{hash, TxHash, TX_HASH_SIZE};
