//! In-memory chain store.

use basalt_ledger::{BlockPtr, BlockStatus, ChainStore};
use basalt_types::{Block, Hash, GENESIS_DIGEST};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

struct ChainInner {
    blocks: HashMap<Hash, BlockPtr>,
    heaviest: Hash,
}

/// Hash-indexed block graph with heaviest-chain tracking.
///
/// Weight is the block number with the digest as tie-breaker, which is all
/// the coordinator needs; real weight policy lives behind the trait.
pub struct InMemoryChain {
    inner: Mutex<ChainInner>,
}

impl InMemoryChain {
    /// Chain seeded with the designated genesis block.
    pub fn new() -> Self {
        let genesis = Arc::new(Block::genesis());
        let heaviest = genesis.body.hash;

        let mut blocks = HashMap::new();
        blocks.insert(heaviest, genesis);

        Self {
            inner: Mutex::new(ChainInner { blocks, heaviest }),
        }
    }

    /// The genesis block of this chain.
    pub fn genesis_block(&self) -> BlockPtr {
        let inner = self.inner.lock().unwrap();
        let genesis = inner
            .blocks
            .values()
            .find(|block| block.body.previous_hash == GENESIS_DIGEST)
            .expect("chain always holds genesis");
        Arc::clone(genesis)
    }

    /// True when a block with this digest is present.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.lock().unwrap().blocks.contains_key(hash)
    }

    /// Number of blocks held.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    /// True when nothing is held (never the case in practice).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn recompute_heaviest(inner: &mut ChainInner) {
        if let Some(block) = inner
            .blocks
            .values()
            .max_by_key(|block| (block.body.block_number, block.body.hash))
        {
            inner.heaviest = block.body.hash;
        }
    }
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore for InMemoryChain {
    fn heaviest_block(&self) -> BlockPtr {
        let inner = self.inner.lock().unwrap();
        let heaviest = inner.heaviest;
        Arc::clone(
            inner
                .blocks
                .get(&heaviest)
                .expect("heaviest always resolves"),
        )
    }

    fn heaviest_block_hash(&self) -> Hash {
        self.inner.lock().unwrap().heaviest
    }

    fn get_block(&self, hash: &Hash) -> Option<BlockPtr> {
        self.inner.lock().unwrap().blocks.get(hash).cloned()
    }

    fn path_to_common_ancestor(&self, from: &Hash, to: &Hash) -> Option<Vec<BlockPtr>> {
        let inner = self.inner.lock().unwrap();

        // Collect every ancestor of `to`, inclusive.
        let mut ancestors = HashSet::new();
        let mut cursor = *to;
        loop {
            let block = inner.blocks.get(&cursor)?;
            ancestors.insert(cursor);
            cursor = block.body.previous_hash;
            if cursor == GENESIS_DIGEST {
                break;
            }
        }

        // Walk back from `from` until the walks meet.
        let mut path = Vec::new();
        let mut cursor = *from;
        loop {
            let block = inner.blocks.get(&cursor)?;
            path.push(Arc::clone(block));

            if ancestors.contains(&cursor) {
                return Some(path);
            }

            cursor = block.body.previous_hash;
            if cursor == GENESIS_DIGEST {
                // Ran off the chain without meeting the other walk.
                return None;
            }
        }
    }

    fn add_block(&self, block: Block) -> BlockStatus {
        let mut inner = self.inner.lock().unwrap();

        let hash = block.body.hash;
        if hash == GENESIS_DIGEST {
            return BlockStatus::Invalid;
        }
        if inner.blocks.contains_key(&hash) {
            return BlockStatus::Duplicate;
        }
        if !inner.blocks.contains_key(&block.body.previous_hash) {
            return BlockStatus::Loose;
        }

        inner.blocks.insert(hash, Arc::new(block));
        Self::recompute_heaviest(&mut inner);
        BlockStatus::Added
    }

    fn remove_block(&self, hash: &Hash) {
        let mut inner = self.inner.lock().unwrap();

        // Remove the block and everything built on top of it.
        let mut doomed: HashSet<Hash> = HashSet::new();
        doomed.insert(*hash);
        loop {
            let next: Vec<Hash> = inner
                .blocks
                .values()
                .filter(|block| {
                    doomed.contains(&block.body.previous_hash)
                        && !doomed.contains(&block.body.hash)
                })
                .map(|block| block.body.hash)
                .collect();

            if next.is_empty() {
                break;
            }
            doomed.extend(next);
        }

        for hash in &doomed {
            inner.blocks.remove(hash);
        }
        Self::recompute_heaviest(&mut inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_types::Identity;

    fn child_of(parent: &Block, number: u64, seed: u8) -> Block {
        let mut block = Block::default();
        block.body.previous_hash = parent.body.hash;
        block.body.block_number = number;
        block.body.miner = Identity::default();
        block.body.merkle_hash = Hash::from_bytes(&[seed]);
        block.update_digest();
        block
    }

    #[test]
    fn test_new_chain_has_genesis_heaviest() {
        let chain = InMemoryChain::new();
        let genesis = chain.genesis_block();
        assert_eq!(chain.heaviest_block_hash(), genesis.body.hash);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_add_block_updates_heaviest() {
        let chain = InMemoryChain::new();
        let genesis = chain.genesis_block();

        let b1 = child_of(&genesis, 1, 1);
        let b1_hash = b1.body.hash;
        assert_eq!(chain.add_block(b1), BlockStatus::Added);
        assert_eq!(chain.heaviest_block_hash(), b1_hash);
    }

    #[test]
    fn test_duplicate_and_loose_blocks() {
        let chain = InMemoryChain::new();
        let genesis = chain.genesis_block();

        let b1 = child_of(&genesis, 1, 1);
        assert_eq!(chain.add_block(b1.clone()), BlockStatus::Added);
        assert_eq!(chain.add_block(b1.clone()), BlockStatus::Duplicate);

        let mut orphan = child_of(&b1, 5, 9);
        orphan.body.previous_hash = Hash::from_bytes(b"unknown parent");
        orphan.update_digest();
        assert_eq!(chain.add_block(orphan), BlockStatus::Loose);
    }

    #[test]
    fn test_path_to_common_ancestor_linear() {
        let chain = InMemoryChain::new();
        let genesis = chain.genesis_block();

        let b1 = child_of(&genesis, 1, 1);
        let b2 = child_of(&b1, 2, 2);
        chain.add_block(b1.clone());
        chain.add_block(b2.clone());

        let path = chain
            .path_to_common_ancestor(&b2.body.hash, &genesis.body.hash)
            .unwrap();
        let hashes: Vec<Hash> = path.iter().map(|b| b.body.hash).collect();
        assert_eq!(hashes, vec![b2.body.hash, b1.body.hash, genesis.body.hash]);
    }

    #[test]
    fn test_path_to_common_ancestor_forked() {
        let chain = InMemoryChain::new();
        let genesis = chain.genesis_block();

        let a1 = child_of(&genesis, 1, 1);
        let a2 = child_of(&a1, 2, 2);
        let b2 = child_of(&a1, 2, 3);
        let b3 = child_of(&b2, 3, 4);
        for block in [&a1, &a2, &b2, &b3] {
            chain.add_block(block.clone());
        }

        let path = chain
            .path_to_common_ancestor(&b3.body.hash, &a2.body.hash)
            .unwrap();
        let hashes: Vec<Hash> = path.iter().map(|b| b.body.hash).collect();
        assert_eq!(hashes, vec![b3.body.hash, b2.body.hash, a1.body.hash]);
    }

    #[test]
    fn test_remove_block_takes_descendants() {
        let chain = InMemoryChain::new();
        let genesis = chain.genesis_block();

        let b1 = child_of(&genesis, 1, 1);
        let b2 = child_of(&b1, 2, 2);
        chain.add_block(b1.clone());
        chain.add_block(b2.clone());

        chain.remove_block(&b1.body.hash);
        assert!(!chain.contains(&b1.body.hash));
        assert!(!chain.contains(&b2.body.hash));
        assert_eq!(chain.heaviest_block_hash(), genesis.body.hash);
    }
}
