//! Default proof-of-work searcher.

use crate::traits::Miner;
use basalt_types::Block;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use tracing::debug;

/// Bounded linear nonce search from a random starting point.
///
/// Each [`Miner::mine`] call draws a fresh starting nonce and walks forward
/// for at most the given budget, so repeated calls cover disjoint regions
/// of the nonce space with high probability. Seed the generator for
/// reproducible searches in tests.
pub struct NonceMiner {
    rng: Mutex<ChaCha8Rng>,
}

impl NonceMiner {
    /// Miner with an entropy-seeded generator.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Miner with a deterministic generator.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl Default for NonceMiner {
    fn default() -> Self {
        Self::new()
    }
}

impl Miner for NonceMiner {
    fn mine(&self, block: &mut Block, budget: u64) -> bool {
        let start: u64 = self.rng.lock().unwrap().gen();

        for offset in 0..budget {
            let nonce = start.wrapping_add(offset);
            block.proof.set_nonce(nonce);

            let digest = block.digest();
            if block.proof.is_valid_for(&digest) {
                debug!(nonce, attempts = offset + 1, "proof found");
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_types::{Hash, TransactionLayout};
    use tracing_test::traced_test;

    fn candidate_block(target: u32) -> Block {
        let mut block = Block::default();
        block.body.previous_hash = Hash::from_bytes(b"parent");
        block.body.block_number = 1;
        block.body.slices = vec![vec![TransactionLayout::new(Hash::from_bytes(b"tx"))]];
        block.proof.set_target(target);
        block
    }

    #[test]
    #[traced_test]
    fn test_zero_target_succeeds_immediately() {
        let miner = NonceMiner::with_seed(7);
        let mut block = candidate_block(0);

        assert!(miner.mine(&mut block, 1));
        assert!(block.proof_is_valid());
        assert!(logs_contain("proof found"));
    }

    #[test]
    fn test_small_target_found_within_budget() {
        let miner = NonceMiner::with_seed(42);
        let mut block = candidate_block(4);

        // Expected ~16 attempts for 4 leading zero bits; the budget leaves
        // plenty of headroom for a deterministic seed.
        assert!(miner.mine(&mut block, 1000));
        assert!(block.proof_is_valid());
    }

    #[test]
    fn test_impossible_target_exhausts_budget() {
        let miner = NonceMiner::with_seed(1);
        let mut block = candidate_block(256);

        assert!(!miner.mine(&mut block, 10));
        assert!(!block.proof_is_valid());
    }
}
