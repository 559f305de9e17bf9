//! Queue-fed block packer.

use basalt_ledger::{BlockPacker, ChainStore, PackError};
use basalt_types::{Block, Slice, TransactionLayout};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Packer that drains a queue of transaction layouts into slices.
///
/// Layouts are distributed round-robin across the requested slice count.
/// `fail_next` makes the next call report an unavailable mempool, which is
/// how tests exercise the coordinator's pack-failure path.
#[derive(Default)]
pub struct QueuePacker {
    queue: Mutex<VecDeque<TransactionLayout>>,
    fail_next: Mutex<bool>,
}

impl QueuePacker {
    /// Empty packer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transaction layout for the next block.
    pub fn enqueue(&self, layout: TransactionLayout) {
        self.queue.lock().unwrap().push_back(layout);
    }

    /// Queue several layouts.
    pub fn enqueue_all(&self, layouts: impl IntoIterator<Item = TransactionLayout>) {
        self.queue.lock().unwrap().extend(layouts);
    }

    /// Number of queued layouts.
    pub fn pending_count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Make the next `generate_block` call fail.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

impl BlockPacker for QueuePacker {
    fn generate_block(
        &self,
        block: &mut Block,
        num_lanes: usize,
        num_slices: usize,
        _chain: &dyn ChainStore,
    ) -> Result<(), PackError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(PackError::MempoolUnavailable("mempool offline".to_string()));
        }

        block.body.log2_num_lanes = num_lanes.trailing_zeros();
        block.body.slices = vec![Slice::new(); num_slices];

        let mut queue = self.queue.lock().unwrap();
        for (index, layout) in queue.drain(..).enumerate() {
            block.body.slices[index % num_slices].push(layout);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryChain;
    use basalt_types::Hash;

    fn layouts(count: u8) -> Vec<TransactionLayout> {
        (0..count)
            .map(|seed| TransactionLayout::new(Hash::from_bytes(&[seed])))
            .collect()
    }

    #[test]
    fn test_distributes_round_robin() {
        let chain = InMemoryChain::new();
        let packer = QueuePacker::new();
        packer.enqueue_all(layouts(5));

        let mut block = Block::default();
        packer.generate_block(&mut block, 4, 2, &chain).unwrap();

        assert_eq!(block.body.log2_num_lanes, 2);
        assert_eq!(block.body.slices.len(), 2);
        assert_eq!(block.body.slices[0].len(), 3);
        assert_eq!(block.body.slices[1].len(), 2);
        assert_eq!(packer.pending_count(), 0);
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let chain = InMemoryChain::new();
        let packer = QueuePacker::new();
        packer.fail_next();

        let mut block = Block::default();
        assert!(packer.generate_block(&mut block, 1, 1, &chain).is_err());
        assert!(packer.generate_block(&mut block, 1, 1, &chain).is_ok());
    }
}
