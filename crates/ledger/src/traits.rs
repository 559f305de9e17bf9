//! Collaborator contracts consumed by the block coordinator.
//!
//! Each collaborator is expressed as a capability set: the coordinator only
//! ever sees these traits, and variants (in-memory, persistent, remote)
//! plug in by implementing the capability. Every method takes `&self`;
//! implementors carry their own synchronization.

use basalt_types::{Block, BlockBody, Hash, TransactionStatus};
use std::fmt;
use std::sync::Arc;

/// Shared handle to a block owned by the chain store.
pub type BlockPtr = Arc<Block>;

/// Outcome of offering a block to the chain store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The block was added to the chain.
    Added,
    /// The block's parent is unknown; it cannot be attached yet.
    Loose,
    /// The block is already present.
    Duplicate,
    /// The block was rejected outright.
    Invalid,
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Added => "Added",
            Self::Loose => "Loose",
            Self::Duplicate => "Duplicate",
            Self::Invalid => "Invalid",
        };
        f.write_str(text)
    }
}

/// Verdict of submitting a block body for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    /// The block was accepted and execution is underway.
    Scheduled,
    /// The manager is not running.
    NotStarted,
    /// Another block is still executing.
    AlreadyRunning,
    /// The manager has no record of the parent block.
    NoParentBlock,
    /// The body could not be planned across the lanes.
    UnableToPlan,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Scheduled => "Scheduled",
            Self::NotStarted => "Not Started",
            Self::AlreadyRunning => "Already Running",
            Self::NoParentBlock => "No Parent Block",
            Self::UnableToPlan => "Unable To Plan",
        };
        f.write_str(text)
    }
}

/// Raw state of the execution manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// No block is executing.
    Idle,
    /// A block is executing.
    Active,
    /// Execution cannot proceed because transactions are missing.
    TransactionsUnavailable,
    /// Execution was aborted.
    ExecutionAborted,
    /// Execution failed.
    ExecutionFailed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "Idle",
            Self::Active => "Active",
            Self::TransactionsUnavailable => "Transactions Unavailable",
            Self::ExecutionAborted => "Execution Aborted",
            Self::ExecutionFailed => "Execution Failed",
        };
        f.write_str(text)
    }
}

/// Error produced by the block packer.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// The transaction source could not be consulted.
    #[error("mempool unavailable: {0}")]
    MempoolUnavailable(String),

    /// Transactions could not be arranged into the requested slices.
    #[error("slice assembly failed: {0}")]
    SliceAssembly(String),
}

/// Error produced by the block sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink refused the block.
    #[error("block rejected by sink: {0}")]
    Rejected(String),

    /// The sink could not be reached.
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// The main-chain graph of known blocks.
pub trait ChainStore: Send + Sync {
    /// The tip of the heaviest known chain.
    fn heaviest_block(&self) -> BlockPtr;

    /// Digest of the heaviest block.
    fn heaviest_block_hash(&self) -> Hash;

    /// Look up a block by digest.
    fn get_block(&self, hash: &Hash) -> Option<BlockPtr>;

    /// Walk from the block at `from` back to the common ancestor of `from`
    /// and `to`.
    ///
    /// On success the sequence starts with the block at `from` and ends
    /// with the common ancestor; `None` means one of the digests could not
    /// be resolved.
    fn path_to_common_ancestor(&self, from: &Hash, to: &Hash) -> Option<Vec<BlockPtr>>;

    /// Offer a block to the chain.
    fn add_block(&self, block: Block) -> BlockStatus;

    /// Remove a block (and anything built on it) from the chain.
    fn remove_block(&self, hash: &Hash);
}

/// The storage unit holding merkle-committed world state.
pub trait StorageUnit: Send + Sync {
    /// Merkle root of the current (possibly uncommitted) world state.
    fn current_hash(&self) -> Hash;

    /// Merkle root of the last committed state.
    fn last_commit_hash(&self) -> Hash;

    /// Revert the world state to a previously committed checkpoint.
    ///
    /// Returns `false` when no such checkpoint exists.
    fn revert_to_hash(&self, hash: &Hash, block_number: u64) -> bool;

    /// Check whether a checkpoint exists.
    fn hash_exists(&self, hash: &Hash, block_number: u64) -> bool;

    /// Check whether the full transaction for a digest is available.
    fn has_transaction(&self, digest: &Hash) -> bool;

    /// Commit the current state as the checkpoint for `block_number`.
    fn commit(&self, block_number: u64);
}

/// The execution manager running block bodies against sharded world state.
pub trait ExecutionManager: Send + Sync {
    /// Submit a block body for execution.
    ///
    /// Returns promptly with a scheduling verdict; execution proceeds in
    /// the manager's own workers and completion is observed by polling
    /// [`ExecutionManager::get_state`].
    fn execute(&self, body: &BlockBody) -> ScheduleStatus;

    /// Current raw execution state.
    fn get_state(&self) -> ExecutionState;

    /// Record the digest of the last fully processed block.
    fn set_last_processed_block(&self, hash: Hash);

    /// Digest of the last fully processed block.
    fn last_processed_block(&self) -> Hash;

    /// Abort the execution in flight. Returns `true` when an execution was
    /// aborted.
    fn abort(&self) -> bool;
}

/// The block packer assembling candidate blocks from a mempool.
pub trait BlockPacker: Send + Sync {
    /// Fill `block` with slices for the given lane and slice geometry.
    ///
    /// The block arrives with its chain position (previous hash, number,
    /// miner) already set; the packer owns the slice contents.
    fn generate_block(
        &self,
        block: &mut Block,
        num_lanes: usize,
        num_slices: usize,
        chain: &dyn ChainStore,
    ) -> Result<(), PackError>;
}

/// A bounded proof-of-work searcher.
pub trait Miner: Send + Sync {
    /// Attempt up to `budget` nonces against the block's proof target.
    ///
    /// Returns `true` iff a satisfying nonce was found and stored in the
    /// block's proof.
    fn mine(&self, block: &mut Block, budget: u64) -> bool;
}

/// Destination for newly produced blocks.
pub trait BlockSink: Send + Sync {
    /// Hand a sealed block over for broadcast.
    fn on_block(&self, block: &Block) -> Result<(), SinkError>;
}

/// Observer-visible table of transaction statuses.
pub trait TransactionStatusCache: Send + Sync {
    /// Record the status of a transaction.
    fn update(&self, digest: Hash, status: TransactionStatus);
}
