mod helpers;

use std::time::Duration;

use helpers::{build_chain, random_block, random_record};
use rand::{rngs::StdRng, Rng, SeedableRng};
use txchain_core::{
    constants::{GENESIS_PREV_HASH, MAX_DIFFICULTY},
    pow::{self, MiningControl},
    Block, Chain, ChainError, MiningError, Record,
};

fn leading_hex_zeros(digest: &str) -> usize {
    digest.chars().take_while(|c| *c == '0').count()
}

#[test]
fn test_digest_differs_under_random_field_variation() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let block = random_block(&mut rng);
        let digest = block.digest();
        assert_eq!(digest, block.digest());

        let mut variant = block.clone();
        match rng.gen_range(0..7) {
            0 => variant.record.sender.push('!'),
            1 => variant.record.receiver.push('!'),
            2 => variant.record.amount.push('1'),
            3 => variant.creator_id = variant.creator_id.wrapping_add(1),
            4 => variant.timestamp.push('0'),
            5 => {
                variant.prev_hash.pop();
            }
            _ => variant.nonce += 1,
        }
        assert_ne!(variant, block);
        assert_ne!(variant.digest(), digest);
    }
}

#[test]
fn test_nonce_neighbours_never_collide() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let mut block = random_block(&mut rng);
        let before = block.digest();
        block.nonce += 1;
        assert_ne!(before, block.digest());
    }
}

#[test]
fn test_mining_meets_difficulty() {
    let mut rng = StdRng::seed_from_u64(1);
    for difficulty in 0..=3 {
        let block = random_block(&mut rng);
        let start = block.nonce;
        let mined = pow::mine_block(block, difficulty);
        assert!(leading_hex_zeros(&mined.digest()) >= difficulty as usize);
        if difficulty == 0 {
            assert_eq!(mined.nonce, start);
        }
    }
}

#[test]
fn test_genesis_chain_is_valid() {
    let chain = Chain::new(Record::genesis(), 0);
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.tip().prev_hash, GENESIS_PREV_HASH);
    assert!(chain.is_valid());
    assert!(chain.verify().is_ok());
}

#[test]
fn test_random_chain_is_valid() {
    let mut rng = StdRng::seed_from_u64(3);
    let chain = build_chain(&mut rng, 1, 25);
    assert_eq!(chain.len(), 26);
    for pair in chain.blocks().windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].digest());
        assert!(pair[1].digest().starts_with('0'));
    }
    assert!(chain.is_valid());
}

#[test]
fn test_unguarded_append_breaks_second_boundary() {
    let mut chain = Chain::with_difficulty(Record::genesis(), 0, 1).unwrap();
    let stale = chain.tip().digest();
    chain.add_candidate(Block::new(Record::new("A", "B", "1"), 42, stale.clone()));
    assert!(chain.is_valid());
    chain.add_candidate(Block::new(Record::new("A", "B", "2"), 42, stale));
    assert!(!chain.is_valid());
    assert!(matches!(
        chain.verify(),
        Err(ChainError::InvalidLinkage { index: 2, .. })
    ));
}

#[test]
fn test_difficulty_changes_affect_future_blocks_only() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut chain = build_chain(&mut rng, 0, 3);
    chain.set_difficulty(2).unwrap();
    assert!(chain.is_valid());
    let sealed = chain.add_block(random_record(&mut rng), 42).clone();
    assert!(sealed.digest().starts_with("00"));
    assert!(chain.is_valid());
    assert!(matches!(
        chain.set_difficulty(MAX_DIFFICULTY + 1),
        Err(ChainError::DifficultyTooHigh { .. })
    ));
}

#[test]
fn test_chain_serialization() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(9);
    let chain = build_chain(&mut rng, 0, 2);
    let json = serde_json::to_value(&chain)?;
    assert_eq!(json["difficulty"], 0);
    assert_eq!(json["blocks"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["tip_hash"], chain.tip().digest());
    let blocks: Vec<Block> = serde_json::from_value(json["blocks"].clone())?;
    assert_eq!(blocks, chain.blocks());

    let mut restored: Chain = serde_json::from_value(json)?;
    assert_eq!(restored.tip_hash(), chain.tip_hash());
    assert!(restored.verify().is_ok());
    // A restored chain keeps growing from its tip.
    restored.add_block(random_record(&mut rng), 42);
    assert_eq!(restored.len(), 4);
    assert!(restored.is_valid());
    Ok(())
}

#[tokio::test]
async fn test_mining_cancelled_from_another_task() -> anyhow::Result<()> {
    let chain = Chain::with_difficulty(Record::genesis(), 0, MAX_DIFFICULTY)?;
    let candidate = chain.candidate(Record::new("A", "B", "1"), 42);
    let control = MiningControl::new();
    let worker_control = control.clone();
    let difficulty = chain.difficulty();
    let handle = tokio::task::spawn_blocking(move || {
        pow::try_mine_block(candidate, difficulty, &worker_control)
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    control.cancel();
    let result = handle.await?;
    assert!(matches!(result, Err(MiningError::Cancelled { .. })));
    assert_eq!(chain.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sealed_block_from_worker_appends_cleanly() -> anyhow::Result<()> {
    let mut chain = Chain::with_difficulty(Record::genesis(), 0, 2)?;
    let candidate = chain.candidate(Record::new("A", "B", "1"), 42);
    let difficulty = chain.difficulty();
    let sealed = tokio::task::spawn_blocking(move || {
        pow::mine_block_parallel(candidate, difficulty, &MiningControl::new())
    })
    .await??;
    let nonce = sealed.nonce;
    // Already sealed, so appending does not move the nonce.
    let appended = chain.add_candidate(sealed);
    assert_eq!(appended.nonce, nonce);
    assert!(chain.is_valid());
    Ok(())
}
