//! Deterministic in-memory collaborators for coordinator tests.
//!
//! Everything here implements the capability traits from `basalt-ledger`
//! with plain locked containers:
//!
//! - [`InMemoryChain`]: block graph with heaviest tracking
//! - [`SimStorageUnit`]: merkle checkpoints and transaction presence
//! - [`SimExecutionManager`]: applies a deterministic transition digest,
//!   with injectable latency and faults
//! - [`QueuePacker`] / [`RecordingSink`]: mempool feed and broadcast capture
//! - [`ChainBuilder`]: fixture builder computing the merkle roots blocks
//!   must declare to survive post-execution validation

mod chain;
mod execution;
mod fixtures;
mod packer;
mod sink;
mod storage;

pub use chain::InMemoryChain;
pub use execution::{apply_block, CompletionFault, SimExecutionManager};
pub use fixtures::{register_block_txs, tx_layout, ChainBuilder};
pub use packer::QueuePacker;
pub use sink::RecordingSink;
pub use storage::SimStorageUnit;
