use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    constants::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY},
    error::{ChainError, MiningError, Result},
    pow::{self, MiningControl},
    Block, Record,
};

/// Ordered, append-only sequence of sealed blocks.
///
/// The chain always holds at least its genesis block. Blocks are only handed
/// out by shared reference, so nothing outside the crate can change a block
/// once it has been appended.
///
/// `tip_hash` is the digest of the last block as it was when appended. It
/// is what lets validation notice a change to the final block, which no later
/// `prev_hash` covers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ChainParts")]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    tip_hash: String,
}

/// Wire shape of a [`Chain`]. The recorded `tip_hash` is kept as read, so a
/// chain edited while serialized fails [`Chain::verify`].
#[derive(Deserialize)]
struct ChainParts {
    blocks: Vec<Block>,
    difficulty: u32,
    tip_hash: String,
}

impl TryFrom<ChainParts> for Chain {
    type Error = ChainError;

    fn try_from(parts: ChainParts) -> Result<Self> {
        if parts.blocks.is_empty() {
            return Err(ChainError::MissingGenesis);
        }
        if parts.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::DifficultyTooHigh {
                requested: parts.difficulty,
                max: MAX_DIFFICULTY,
            });
        }
        Ok(Self {
            blocks: parts.blocks,
            difficulty: parts.difficulty,
            tip_hash: parts.tip_hash,
        })
    }
}

impl Chain {
    /// A chain holding only the genesis block, at [`DEFAULT_DIFFICULTY`].
    pub fn new(genesis_record: Record, genesis_creator_id: u64) -> Self {
        let genesis = Block::genesis(genesis_record, genesis_creator_id);
        Self {
            tip_hash: genesis.digest(),
            blocks: vec![genesis],
            difficulty: DEFAULT_DIFFICULTY,
        }
    }

    pub fn with_difficulty(
        genesis_record: Record,
        genesis_creator_id: u64,
        difficulty: u32,
    ) -> Result<Self> {
        let mut chain = Self::new(genesis_record, genesis_creator_id);
        chain.set_difficulty(difficulty)?;
        Ok(chain)
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Applies to blocks mined from now on. Existing blocks stay valid.
    pub fn set_difficulty(&mut self, difficulty: u32) -> Result<()> {
        if difficulty > MAX_DIFFICULTY {
            return Err(ChainError::DifficultyTooHigh {
                requested: difficulty,
                max: MAX_DIFFICULTY,
            });
        }
        debug!(from = self.difficulty, to = difficulty, "difficulty changed");
        self.difficulty = difficulty;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false outside this crate's tests: construction and
    /// deserialization both require a genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// The most recently appended block.
    pub fn tip(&self) -> &Block {
        // `new` seeds the genesis block and nothing removes blocks.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Digest of the tip recorded when it was appended.
    pub fn tip_hash(&self) -> &str {
        &self.tip_hash
    }

    /// Unsealed block linked to the current tip.
    pub fn candidate(&self, record: Record, creator_id: u64) -> Block {
        Block::new(record, creator_id, self.tip().digest())
    }

    /// Link `record` to the current tip, mine it at the chain's difficulty and
    /// append it.
    pub fn add_block(&mut self, record: Record, creator_id: u64) -> &Block {
        let candidate = self.candidate(record, creator_id);
        self.add_candidate(candidate)
    }

    /// Like [`Chain::add_block`] but mining stops when `control` says so. On
    /// error the chain is left untouched.
    pub fn try_add_block(
        &mut self,
        record: Record,
        creator_id: u64,
        control: &MiningControl,
    ) -> std::result::Result<&Block, MiningError> {
        let candidate = self.candidate(record, creator_id);
        let sealed = pow::try_mine_block(candidate, self.difficulty, control)?;
        Ok(self.push(sealed))
    }

    /// Mine `candidate` at the chain's difficulty and append it as is.
    ///
    /// `prev_hash` is not checked against the tip. A candidate built from a
    /// stale tip is still appended and makes [`Chain::is_valid`] fail later.
    /// Use [`Chain::add_block`] unless that is what you want.
    pub fn add_candidate(&mut self, candidate: Block) -> &Block {
        let sealed = pow::mine_block(candidate, self.difficulty);
        self.push(sealed)
    }

    fn push(&mut self, sealed: Block) -> &Block {
        let digest = sealed.digest();
        info!(
            "Mined block {} with nonce {} and hash {}",
            self.blocks.len(),
            sealed.nonce,
            digest
        );
        self.tip_hash = digest;
        self.blocks.push(sealed);
        debug!(len = self.blocks.len(), "block appended");
        self.tip()
    }

    /// Walk the chain once, checking each block's `prev_hash` against the
    /// digest of the block before it, then the last digest against the
    /// recorded tip. Stops at the first break.
    pub fn verify(&self) -> Result<()> {
        let Some((first, rest)) = self.blocks.split_first() else {
            return Ok(());
        };
        let mut running = first.digest();
        for (offset, block) in rest.iter().enumerate() {
            if block.prev_hash != running {
                let index = offset + 1;
                warn!(index, "Blockchain is invalid!");
                return Err(ChainError::InvalidLinkage {
                    index,
                    expected: running,
                    found: block.prev_hash.clone(),
                });
            }
            running = block.digest();
        }
        if running != self.tip_hash {
            warn!(index = self.blocks.len() - 1, "Blockchain is invalid!");
            return Err(ChainError::TipMismatch {
                expected: self.tip_hash.clone(),
                found: running,
            });
        }
        info!(len = self.blocks.len(), "Blockchain is valid");
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
