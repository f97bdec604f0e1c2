use blake3::hash as blake3_hash;
use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use std::{
    convert::TryInto,
    fmt::{Display, Error, Formatter},
    str::FromStr,
};

pub const TX_HASH_SIZE: usize = 32; // 32 bytes / 256 bits

#[derive(Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Debug)]
pub struct TxHash([u8; TX_HASH_SIZE]);

impl TxHash {
    pub const fn new(bytes: [u8; TX_HASH_SIZE]) -> Self {
        TxHash(bytes)
    }

    pub const fn zero() -> Self {
        TxHash::new([0; TX_HASH_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; TX_HASH_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; TX_HASH_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for TxHash {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| "Invalid hex string")?;
        let bytes: [u8; TX_HASH_SIZE] = bytes.try_into().map_err(|_| "Invalid hash")?;
        Ok(TxHash::new(bytes))
    }
}

// Hash a byte array using the blake3 algorithm
#[inline(always)]
pub fn hash(value: &[u8]) -> TxHash {
    let result: [u8; TX_HASH_SIZE] = blake3_hash(value).into();
    TxHash(result)
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for TxHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", &self.to_hex())
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for TxHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let hex = String::deserialize(deserializer)?;
        if hex.len() != TX_HASH_SIZE * 2 {
            return Err(SerdeError::custom("Invalid hex length"));
        }
        TxHash::from_str(&hex).map_err(SerdeError::custom)
    }
}
