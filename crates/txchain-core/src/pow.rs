//! Proof-of-work search.
//!
//! A block is sealed once its hex digest starts with `difficulty` `'0'`
//! characters. Each hex character is one nibble, so the check runs on the raw
//! digest bytes instead of the rendered string.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{constants::NONCE_BATCH_SIZE, error::MiningError, hash_with_nonce, Block, Hash};

/// Mine the block by incrementing its nonce until the digest has at least
/// `difficulty` leading hex zeros. Difficulty 0 returns the block untouched.
///
/// There is no attempt cap: at high difficulty this blocks the calling thread
/// for as long as it takes. Use [`try_mine_block`] when the caller needs a way
/// out.
pub fn mine_block(mut block: Block, difficulty: u32) -> Block {
    let prefix = block.prefix_hasher();
    loop {
        let hash = hash_with_nonce(&prefix, block.nonce);
        if meets_difficulty(&hash, difficulty) {
            debug!(nonce = block.nonce, hash = %hex::encode(hash), "winning hash");
            return block;
        }
        block.nonce = block.nonce.wrapping_add(1);
    }
}

/// Limits for a single mining job. Clones share the cancellation flag, so one
/// copy can be handed to the worker and another kept to cancel it.
#[derive(Clone, Debug, Default)]
pub struct MiningControl {
    max_attempts: Option<u64>,
    cancelled: Arc<AtomicBool>,
}

impl MiningControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Same search as [`mine_block`] but checks `control` before every attempt.
/// An attempt is one digest computation.
pub fn try_mine_block(
    mut block: Block,
    difficulty: u32,
    control: &MiningControl,
) -> Result<Block, MiningError> {
    let prefix = block.prefix_hasher();
    let mut attempts = 0u64;
    loop {
        if control.is_cancelled() {
            warn!(attempts, "mining cancelled");
            return Err(MiningError::Cancelled { attempts });
        }
        if control.max_attempts.is_some_and(|max| attempts >= max) {
            warn!(attempts, "mining attempt limit reached");
            return Err(MiningError::AttemptLimit { attempts });
        }
        attempts += 1;
        let hash = hash_with_nonce(&prefix, block.nonce);
        if meets_difficulty(&hash, difficulty) {
            debug!(nonce = block.nonce, attempts, hash = %hex::encode(hash), "winning hash");
            return Ok(block);
        }
        block.nonce = block
            .nonce
            .checked_add(1)
            .ok_or(MiningError::NonceExhausted)?;
    }
}

/// Search nonces from the block's current nonce upwards across the rayon
/// pool. Returns the lowest satisfying nonce, i.e. the same block
/// [`mine_block`] would produce, and honours `control` the way
/// [`try_mine_block`] does.
pub fn mine_block_parallel(
    mut block: Block,
    difficulty: u32,
    control: &MiningControl,
) -> Result<Block, MiningError> {
    let prefix = block.prefix_hasher();
    let (nonce, attempts) = search_nonces(block.nonce, control, |nonce| {
        meets_difficulty(&hash_with_nonce(&prefix, nonce), difficulty)
    })?;
    block.nonce = nonce;
    debug!(nonce, attempts, "winning nonce (parallel)");
    Ok(block)
}

/// Lowest nonce at or above `start` accepted by `found`, with the number of
/// nonces up to and including it.
///
/// Nonces are handed out in batches of [`NONCE_BATCH_SIZE`]. Every worker
/// hashes inside the current batch and `find_first` keeps the lowest hit, so
/// batches are walked in order and at most one batch is hashed past the
/// answer. `control` is checked between batches; the last batch is trimmed to
/// the attempt cap.
pub(crate) fn search_nonces<F>(
    start: u64,
    control: &MiningControl,
    found: F,
) -> Result<(u64, u64), MiningError>
where
    F: Fn(u64) -> bool + Sync,
{
    let mut base = start;
    let mut attempts = 0u64;
    loop {
        if control.is_cancelled() {
            warn!(attempts, "mining cancelled");
            return Err(MiningError::Cancelled { attempts });
        }
        let budget = control
            .max_attempts
            .map_or(u64::MAX, |max| max.saturating_sub(attempts));
        if budget == 0 {
            warn!(attempts, "mining attempt limit reached");
            return Err(MiningError::AttemptLimit { attempts });
        }
        let len = NONCE_BATCH_SIZE
            .min(budget)
            .min((u64::MAX - base).saturating_add(1));

        let hit = (0..len as usize)
            .into_par_iter()
            .find_first(|offset| found(base + *offset as u64));
        if let Some(offset) = hit {
            let offset = offset as u64;
            return Ok((base + offset, attempts + offset + 1));
        }
        attempts += len;
        base = base.checked_add(len).ok_or(MiningError::NonceExhausted)?;
    }
}

pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    count_leading_zero_nibbles(hash) >= difficulty
}

/// Number of leading `'0'` characters in the hex rendering of `hash`.
pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}
