//! Configuration for the block coordinator.

use basalt_types::Identity;
use std::time::Duration;

/// Configuration for [`BlockCoordinator`](crate::coordinator::BlockCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of world-state lanes. Must be a power of two and match the
    /// lane count blocks are packed for.
    pub num_lanes: usize,

    /// Number of slices per block.
    pub num_slices: usize,

    /// Proof-of-work target for produced blocks, as leading zero bits.
    pub block_difficulty: u32,

    /// Minimum interval between produced blocks.
    pub block_period: Duration,

    /// Whether this node produces blocks at all.
    pub mining: bool,

    /// Identity stamped into produced blocks.
    pub identity: Identity,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            num_lanes: 1,
            num_slices: 1,
            block_difficulty: 8,
            block_period: Duration::from_secs(10),
            mining: false,
            identity: Identity::default(),
        }
    }
}
