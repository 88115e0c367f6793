use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Invalid linkage at block {index}: expected prev_hash {expected}, found {found}")]
    InvalidLinkage {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Tip was changed after it was appended: expected {expected}, found {found}")]
    TipMismatch { expected: String, found: String },
    #[error("Chain has no genesis block")]
    MissingGenesis,
    #[error("Difficulty {requested} exceeds the maximum of {max}")]
    DifficultyTooHigh { requested: u32, max: u32 },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MiningError {
    #[error("Mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("Gave up after {attempts} attempts without meeting the difficulty")]
    AttemptLimit { attempts: u64 },
    #[error("Nonce space exhausted")]
    NonceExhausted,
}
