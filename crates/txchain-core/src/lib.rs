pub mod chain;
pub mod constants;
pub mod error;
pub mod pow;

pub use chain::Chain;
pub use error::{ChainError, MiningError, Result};
pub use pow::MiningControl;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::{GENESIS_PREV_HASH, GENESIS_SENDER, HASH_SIZE, TIMESTAMP_FORMAT};

pub type Hash = [u8; HASH_SIZE];

/// A single transfer entered by the user. The amount is kept as the text the
/// user typed; nothing in the chain interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sender: String,
    pub receiver: String,
    pub amount: String,
}

impl Record {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount: amount.into(),
        }
    }

    pub fn genesis() -> Self {
        Self::new(GENESIS_SENDER, "", "0")
    }

    /// Numeric view of the amount for display. `None` when the text is not a
    /// finite number.
    pub fn amount_as_decimal(&self) -> Option<f64> {
        self.amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

/// Canonical text fed into the block digest. Fields are quoted and escaped so
/// separators inside user input cannot collide with the layout.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record(sender={:?}, receiver={:?}, amount={:?})",
            self.sender, self.receiver, self.amount
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub record: Record,
    pub creator_id: u64,
    /// Hex digest of the previous block, or [`GENESIS_PREV_HASH`].
    pub prev_hash: String,
    pub timestamp: String,
    pub nonce: u64,
}

impl Block {
    /// A candidate block stamped with the current UTC time and nonce 0.
    pub fn new(record: Record, creator_id: u64, prev_hash: impl Into<String>) -> Self {
        Self {
            record,
            creator_id,
            prev_hash: prev_hash.into(),
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            nonce: 0,
        }
    }

    pub fn genesis(record: Record, creator_id: u64) -> Self {
        Self::new(record, creator_id, GENESIS_PREV_HASH)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS_PREV_HASH
    }

    /// Hasher primed with every field except the nonce, in digest order.
    pub(crate) fn prefix_hasher(&self) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(self.record.to_string().as_bytes());
        hasher.update(self.creator_id.to_string().as_bytes());
        hasher.update(format!("{:?}", self.timestamp).as_bytes());
        hasher.update(format!("{:?}", self.prev_hash).as_bytes());
        hasher
    }

    pub fn hash(&self) -> Hash {
        hash_with_nonce(&self.prefix_hasher(), self.nonce)
    }

    /// Lowercase hex SHA-256 over record, creator_id, timestamp, prev_hash
    /// and nonce, in that order.
    pub fn digest(&self) -> String {
        hex::encode(self.hash())
    }
}

pub(crate) fn hash_with_nonce(prefix: &Sha256, nonce: u64) -> Hash {
    let mut hasher = prefix.clone();
    hasher.update(nonce.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}
