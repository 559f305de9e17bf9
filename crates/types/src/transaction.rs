//! Transaction lifecycle status and packing layout.

use crate::Hash;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a transaction as seen by external observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    /// Not seen by this node.
    #[default]
    Unknown,
    /// Present in the mempool, not yet packed.
    Pending,
    /// Packed into a block that has not executed yet.
    Mined,
    /// Executed as part of a committed block.
    Executed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unknown => "Unknown",
            Self::Pending => "Pending",
            Self::Mined => "Mined",
            Self::Executed => "Executed",
        };
        f.write_str(text)
    }
}

/// Error parsing a [`TransactionStatus`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown transaction status: {0}")]
pub struct TransactionStatusParseError(String);

impl FromStr for TransactionStatus {
    type Err = TransactionStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unknown" => Ok(Self::Unknown),
            "Pending" => Ok(Self::Pending),
            "Mined" => Ok(Self::Mined),
            "Executed" => Ok(Self::Executed),
            other => Err(TransactionStatusParseError(other.to_string())),
        }
    }
}

/// Packing summary of a transaction.
///
/// Carries the minimal set of information the block packer needs to place
/// a transaction into a slice: the digest, the lane resource mask, the fee
/// and the block-index validity window. The full transaction lives in the
/// storage unit and is resolved by digest at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLayout {
    /// Digest of the full transaction.
    pub transaction_hash: Hash,
    /// Bitmask of the lanes the transaction touches.
    pub mask: u64,
    /// Fee attached to the transaction.
    pub charge: u64,
    /// Block number from which the transaction is valid.
    pub valid_from: u64,
    /// Block number until which the transaction is valid.
    pub valid_until: u64,
}

impl TransactionLayout {
    /// Layout for a transaction known only by digest.
    pub fn new(transaction_hash: Hash) -> Self {
        Self {
            transaction_hash,
            mask: 0,
            charge: 0,
            valid_from: 0,
            valid_until: u64::MAX,
        }
    }

    /// True when the transaction may be included at the given block number.
    pub fn is_valid_at(&self, block_number: u64) -> bool {
        self.valid_from <= block_number && block_number <= self.valid_until
    }
}
