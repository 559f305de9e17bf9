//! Fixture builders for chain scenarios.

use crate::chain::InMemoryChain;
use crate::execution::apply_block;
use crate::storage::SimStorageUnit;
use basalt_ledger::{BlockPtr, BlockStatus, ChainStore};
use basalt_types::{Block, Hash, Identity, Slice, TransactionLayout, GENESIS_MERKLE_ROOT};
use std::sync::Arc;

/// Transaction layout with a digest derived from a seed byte.
pub fn tx_layout(seed: u8) -> TransactionLayout {
    TransactionLayout::new(Hash::from_bytes(&[seed, 0x7E, seed]))
}

/// Make every transaction of a block available in storage.
pub fn register_block_txs(storage: &SimStorageUnit, block: &Block) {
    storage.add_transactions(block.body.tx_digests());
}

/// Builds linear runs of valid blocks on top of a chain, tracking the
/// cumulative world state with the same transition digest the simulated
/// executor applies.
///
/// ```rust
/// use basalt_ledger::ChainStore;
/// use basalt_test_helpers::{ChainBuilder, InMemoryChain, tx_layout};
/// use std::sync::Arc;
///
/// let chain = Arc::new(InMemoryChain::new());
/// let mut builder = ChainBuilder::new(Arc::clone(&chain), 2, 2);
/// let b1 = builder.append(vec![tx_layout(1)]);
/// let b2 = builder.append(vec![tx_layout(2)]);
/// assert_eq!(chain.heaviest_block_hash(), b2.body.hash);
/// assert_eq!(b2.body.previous_hash, b1.body.hash);
/// ```
pub struct ChainBuilder {
    chain: Arc<InMemoryChain>,
    tip: BlockPtr,
    state: Hash,
    num_lanes: usize,
    num_slices: usize,
}

impl ChainBuilder {
    /// Builder anchored at the chain's genesis block.
    pub fn new(chain: Arc<InMemoryChain>, num_lanes: usize, num_slices: usize) -> Self {
        let tip = chain.genesis_block();
        Self {
            chain,
            tip,
            state: GENESIS_MERKLE_ROOT,
            num_lanes,
            num_slices,
        }
    }

    /// Builder anchored at an arbitrary block with a known post-state,
    /// used to grow fork branches.
    pub fn at(
        chain: Arc<InMemoryChain>,
        tip: BlockPtr,
        state: Hash,
        num_lanes: usize,
        num_slices: usize,
    ) -> Self {
        Self {
            chain,
            tip,
            state,
            num_lanes,
            num_slices,
        }
    }

    /// The block the next append will build on.
    pub fn tip(&self) -> BlockPtr {
        Arc::clone(&self.tip)
    }

    /// World-state root after executing the tip.
    pub fn state(&self) -> Hash {
        self.state
    }

    /// Append a valid block carrying the given transactions.
    ///
    /// The declared merkle root is the state the simulated executor will
    /// actually produce, so the block passes post-execution validation.
    pub fn append(&mut self, txs: Vec<TransactionLayout>) -> BlockPtr {
        let state = self.state;
        self.append_block(txs, None, state)
    }

    /// Append a block declaring a bogus merkle root, so post-execution
    /// validation rejects it.
    pub fn append_with_merkle(&mut self, txs: Vec<TransactionLayout>, merkle: Hash) -> BlockPtr {
        let state = self.state;
        self.append_block(txs, Some(merkle), state)
    }

    fn append_block(
        &mut self,
        txs: Vec<TransactionLayout>,
        merkle_override: Option<Hash>,
        parent_state: Hash,
    ) -> BlockPtr {
        let mut block = Block::default();
        block.body.previous_hash = self.tip.body.hash;
        block.body.block_number = self.tip.body.block_number + 1;
        block.body.miner = Identity::default();
        block.body.log2_num_lanes = self.num_lanes.trailing_zeros();

        block.body.slices = vec![Slice::new(); self.num_slices];
        for (index, layout) in txs.into_iter().enumerate() {
            block.body.slices[index % self.num_slices].push(layout);
        }

        let executed_state = apply_block(parent_state, &block.body);
        block.body.merkle_hash = merkle_override.unwrap_or(executed_state);
        block.update_digest();

        let status = self.chain.add_block(block.clone());
        assert_eq!(status, BlockStatus::Added, "fixture block must attach");

        let tip = self
            .chain
            .get_block(&block.body.hash)
            .expect("freshly added block resolves");
        self.tip = Arc::clone(&tip);
        self.state = executed_state;

        tip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_tracks_state_and_tip() {
        let chain = Arc::new(InMemoryChain::new());
        let mut builder = ChainBuilder::new(Arc::clone(&chain), 2, 1);

        let b1 = builder.append(vec![tx_layout(1)]);
        assert_eq!(b1.body.block_number, 1);
        assert_eq!(b1.body.merkle_hash, builder.state());
        assert_eq!(builder.tip().body.hash, b1.body.hash);

        let b2 = builder.append(vec![tx_layout(2)]);
        assert_eq!(b2.body.previous_hash, b1.body.hash);
        assert_ne!(b2.body.merkle_hash, b1.body.merkle_hash);
    }

    #[test]
    fn test_fork_builder_produces_sibling() {
        let chain = Arc::new(InMemoryChain::new());
        let mut trunk = ChainBuilder::new(Arc::clone(&chain), 1, 1);

        let a1 = trunk.append(vec![tx_layout(1)]);
        let state_after_a1 = trunk.state();
        let _a2 = trunk.append(vec![tx_layout(2)]);

        let mut branch = ChainBuilder::at(
            Arc::clone(&chain),
            Arc::clone(&a1),
            state_after_a1,
            1,
            1,
        );
        let b2 = branch.append(vec![tx_layout(3)]);

        assert_eq!(b2.body.previous_hash, a1.body.hash);
        assert_eq!(b2.body.block_number, 2);
    }

    #[test]
    fn test_bogus_merkle_differs_from_executed_state() {
        let chain = Arc::new(InMemoryChain::new());
        let mut builder = ChainBuilder::new(Arc::clone(&chain), 1, 1);

        let bogus = Hash::from_bytes(b"not the real state");
        let block = builder.append_with_merkle(vec![tx_layout(1)], bogus);

        assert_eq!(block.body.merkle_hash, bogus);
        assert_ne!(block.body.merkle_hash, builder.state());
    }
}
