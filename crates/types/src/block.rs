//! Block, block body and slice types.

use crate::{Hash, Identity, ProofOfWork, TransactionLayout};

/// Digest marking the absent predecessor of the genesis block.
pub const GENESIS_DIGEST: Hash = Hash::ZERO;

/// Merkle root of the empty world state.
pub const GENESIS_MERKLE_ROOT: Hash = Hash::ZERO;

/// An ordered group of transactions executable in parallel across lanes.
pub type Slice = Vec<TransactionLayout>;

/// The body of a block: everything that is covered by the block digest.
#[derive(Debug, Clone, Default)]
pub struct BlockBody {
    /// Digest of this body. Stale until [`Block::update_digest`] runs.
    pub hash: Hash,
    /// Digest of the preceding block, or [`GENESIS_DIGEST`].
    pub previous_hash: Hash,
    /// Height of the block in the chain (genesis = 0).
    pub block_number: u64,
    /// Identity of the producer.
    pub miner: Identity,
    /// Base-2 logarithm of the lane count the body was packed for.
    pub log2_num_lanes: u32,
    /// Declared merkle root of the world state after executing this block.
    pub merkle_hash: Hash,
    /// Ordered slices of transactions.
    pub slices: Vec<Slice>,
}

impl BlockBody {
    /// Number of transactions across all slices.
    pub fn transaction_count(&self) -> usize {
        self.slices.iter().map(Vec::len).sum()
    }

    /// Iterate over every transaction digest in slice order.
    pub fn tx_digests(&self) -> impl Iterator<Item = Hash> + '_ {
        self.slices
            .iter()
            .flat_map(|slice| slice.iter().map(|layout| layout.transaction_hash))
    }
}

/// A block: body plus proof-of-work.
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// The block body.
    pub body: BlockBody,
    /// Proof-of-work over the body.
    pub proof: ProofOfWork,
}

impl Block {
    /// Build the designated genesis block.
    ///
    /// Its `previous_hash` is [`GENESIS_DIGEST`] and its declared merkle
    /// root is [`GENESIS_MERKLE_ROOT`]; the block digest itself is a real
    /// digest of the body, distinct from the sentinel.
    pub fn genesis() -> Self {
        let mut block = Self {
            body: BlockBody {
                previous_hash: GENESIS_DIGEST,
                block_number: 0,
                merkle_hash: GENESIS_MERKLE_ROOT,
                ..BlockBody::default()
            },
            proof: ProofOfWork::default(),
        };
        block.update_digest();
        block
    }

    /// True when this block has no predecessor.
    pub fn is_genesis(&self) -> bool {
        self.body.previous_hash == GENESIS_DIGEST
    }

    /// Number of transactions across all slices.
    pub fn transaction_count(&self) -> usize {
        self.body.transaction_count()
    }

    /// Compute the digest of the body under the current nonce.
    ///
    /// Every body field except the stored `hash` participates, so the
    /// digest doubles as the proof-of-work subject: a block is sealed by
    /// finding a nonce whose digest clears the proof target.
    pub fn digest(&self) -> Hash {
        let body = &self.body;
        let mut hasher = blake3::Hasher::new();

        hasher.update(body.previous_hash.as_bytes());
        hasher.update(&body.block_number.to_le_bytes());
        hasher.update(&(body.miner.len() as u64).to_le_bytes());
        hasher.update(body.miner.as_bytes());
        hasher.update(&body.log2_num_lanes.to_le_bytes());
        hasher.update(body.merkle_hash.as_bytes());

        hasher.update(&(body.slices.len() as u64).to_le_bytes());
        for slice in &body.slices {
            hasher.update(&(slice.len() as u64).to_le_bytes());
            for layout in slice {
                hasher.update(layout.transaction_hash.as_bytes());
                hasher.update(&layout.mask.to_le_bytes());
                hasher.update(&layout.charge.to_le_bytes());
                hasher.update(&layout.valid_from.to_le_bytes());
                hasher.update(&layout.valid_until.to_le_bytes());
            }
        }

        hasher.update(&self.proof.nonce().to_le_bytes());

        Hash::from_raw(*hasher.finalize().as_bytes())
    }

    /// Recompute and store the block digest.
    pub fn update_digest(&mut self) {
        self.body.hash = self.digest();
    }

    /// Check the stored proof nonce against the proof target.
    pub fn proof_is_valid(&self) -> bool {
        self.proof.is_valid_for(&self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with_txs(seeds: &[u8]) -> Block {
        let mut block = Block::default();
        block.body.previous_hash = Hash::from_bytes(b"parent");
        block.body.block_number = 3;
        block.body.slices = vec![seeds
            .iter()
            .map(|&seed| TransactionLayout::new(Hash::from_bytes(&[seed])))
            .collect()];
        block.update_digest();
        block
    }

    #[test]
    fn test_genesis_digest_is_not_the_sentinel() {
        let genesis = Block::genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.body.block_number, 0);
        assert_eq!(genesis.body.merkle_hash, GENESIS_MERKLE_ROOT);
        assert_ne!(genesis.body.hash, GENESIS_DIGEST);
    }

    #[test]
    fn test_digest_changes_with_nonce() {
        let mut block = block_with_txs(&[1, 2, 3]);
        let before = block.body.hash;

        block.proof.set_nonce(99);
        block.update_digest();
        assert_ne!(block.body.hash, before);
    }

    #[test]
    fn test_digest_covers_body_fields() {
        let a = block_with_txs(&[1, 2]);
        let b = block_with_txs(&[1, 3]);
        assert_ne!(a.body.hash, b.body.hash);

        let mut c = block_with_txs(&[1, 2]);
        c.body.merkle_hash = Hash::from_bytes(b"state");
        c.update_digest();
        assert_ne!(a.body.hash, c.body.hash);
    }

    #[test]
    fn test_transaction_accessors() {
        let block = block_with_txs(&[1, 2, 3]);
        assert_eq!(block.transaction_count(), 3);

        let digests: Vec<Hash> = block.body.tx_digests().collect();
        assert_eq!(digests.len(), 3);
        assert_eq!(digests[0], Hash::from_bytes(&[1]));
    }

    #[test]
    fn test_proof_validity_follows_target() {
        let mut block = block_with_txs(&[7]);
        block.proof.set_target(0);
        assert!(block.proof_is_valid());

        block.proof.set_target(256);
        assert!(!block.proof_is_valid());
    }
}
