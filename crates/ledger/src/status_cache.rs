//! Concrete transaction status cache.

use crate::traits::TransactionStatusCache;
use basalt_types::{Hash, TransactionStatus};
use dashmap::DashMap;

/// Concurrent map from transaction digest to lifecycle status.
///
/// Writers (the coordinator) and readers (status queries from RPC shells)
/// touch disjoint shards without blocking each other.
#[derive(Default)]
pub struct StatusCache {
    statuses: DashMap<Hash, TransactionStatus>,
}

impl StatusCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of a transaction; `Unknown` when never recorded.
    pub fn query(&self, digest: &Hash) -> TransactionStatus {
        self.statuses
            .get(digest)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

impl TransactionStatusCache for StatusCache {
    fn update(&self, digest: Hash, status: TransactionStatus) {
        self.statuses.insert(digest, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_by_default() {
        let cache = StatusCache::new();
        assert_eq!(
            cache.query(&Hash::from_bytes(b"tx")),
            TransactionStatus::Unknown
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_update_overwrites() {
        let cache = StatusCache::new();
        let digest = Hash::from_bytes(b"tx");

        cache.update(digest, TransactionStatus::Pending);
        assert_eq!(cache.query(&digest), TransactionStatus::Pending);

        cache.update(digest, TransactionStatus::Executed);
        assert_eq!(cache.query(&digest), TransactionStatus::Executed);
        assert_eq!(cache.len(), 1);
    }
}
