//! Block coordination for the basalt ledger.
//!
//! The centrepiece of this crate is [`BlockCoordinator`], the control-plane
//! state machine that synchronizes the node with the heaviest chain,
//! validates and executes incoming blocks against merkle-committed world
//! state, and optionally produces new blocks with proof-of-work.
//!
//! Collaborators (the chain store, storage unit, execution manager, block
//! packer, miner, block sink and status cache) are consumed through
//! capability traits, so variants plug in freely.

mod config;
mod coordinator;
mod miner;
mod status_cache;
mod traits;

pub use config::CoordinatorConfig;
pub use coordinator::{BlockCoordinator, CoordinatorState, ExecutionProgress, ExecutionStatus};
pub use miner::NonceMiner;
pub use status_cache::StatusCache;
pub use traits::{
    BlockPacker, BlockPtr, BlockSink, BlockStatus, ChainStore, ExecutionManager, ExecutionState,
    Miner, PackError, ScheduleStatus, SinkError, StorageUnit, TransactionStatusCache,
};
