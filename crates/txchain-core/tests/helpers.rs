use rand::{distributions::Alphanumeric, Rng};
use txchain_core::{Block, Chain, Record};

pub fn random_text<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn random_record<R: Rng>(rng: &mut R) -> Record {
    Record::new(
        random_text(rng, 8),
        random_text(rng, 8),
        rng.gen_range(0..1_000_000u64).to_string(),
    )
}

pub fn random_block<R: Rng>(rng: &mut R) -> Block {
    let mut block = Block::new(random_record(rng), rng.gen(), random_text(rng, 64));
    block.timestamp = format!(
        "{:02}:{:02}:{:02}",
        rng.gen_range(0..24),
        rng.gen_range(0..60),
        rng.gen_range(0..60)
    );
    block.nonce = rng.gen_range(0..u64::MAX - 1);
    block
}

/// Genesis chain at `difficulty` with `n` random records appended through the
/// safe path.
pub fn build_chain<R: Rng>(rng: &mut R, difficulty: u32, n: usize) -> Chain {
    let mut chain = Chain::with_difficulty(Record::genesis(), 0, difficulty)
        .expect("difficulty within range");
    for _ in 0..n {
        let creator = rng.gen_range(0..100);
        chain.add_block(random_record(rng), creator);
    }
    chain
}
