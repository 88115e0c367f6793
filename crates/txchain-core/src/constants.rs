pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// `prev_hash` of the genesis block. Not a real digest.
pub const GENESIS_PREV_HASH: &str = "0";
pub const GENESIS_SENDER: &str = "Genesis";

pub const DEFAULT_DIFFICULTY: u32 = 4;
/// One leading hex zero per digest character; anything above can never be met.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;

/// Nonces hashed per round of the parallel search.
pub const NONCE_BATCH_SIZE: u64 = 4096;

pub const DEFAULT_CREATOR_ID: u64 = 42;

/// UTC wall-clock time of block creation.
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";
