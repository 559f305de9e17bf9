//! Recording block sink.

use basalt_ledger::{BlockSink, SinkError};
use basalt_types::Block;
use std::sync::Mutex;

/// Sink that records every block it receives.
#[derive(Default)]
pub struct RecordingSink {
    blocks: Mutex<Vec<Block>>,
    fail: Mutex<bool>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Blocks received so far.
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }

    /// Number of blocks received.
    pub fn count(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }
}

impl BlockSink for RecordingSink {
    fn on_block(&self, block: &Block) -> Result<(), SinkError> {
        if *self.fail.lock().unwrap() {
            return Err(SinkError::Unavailable("network offline".to_string()));
        }

        self.blocks.lock().unwrap().push(block.clone());
        Ok(())
    }
}
