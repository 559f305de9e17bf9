//! Foundational types for the basalt ledger.
//!
//! This crate provides the data model shared by the chain, storage and
//! coordination layers:
//!
//! - **Primitives**: [`Hash`] digests, producer [`Identity`]
//! - **Blocks**: [`Block`], [`BlockBody`], [`Slice`], [`TransactionLayout`]
//! - **Proof-of-work**: [`ProofOfWork`]
//! - **Observability**: [`TransactionStatus`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.

mod block;
mod hash;
mod identity;
mod proof;
mod transaction;

pub use block::{Block, BlockBody, Slice, GENESIS_DIGEST, GENESIS_MERKLE_ROOT};
pub use hash::{Hash, HexError};
pub use identity::Identity;
pub use proof::ProofOfWork;
pub use transaction::{TransactionLayout, TransactionStatus, TransactionStatusParseError};
