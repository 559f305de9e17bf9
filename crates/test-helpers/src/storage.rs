//! In-memory storage unit.

use basalt_ledger::StorageUnit;
use basalt_types::{Hash, GENESIS_MERKLE_ROOT};
use std::collections::HashSet;
use std::sync::Mutex;

struct StorageInner {
    current: Hash,
    last_commit: Hash,
    checkpoints: HashSet<(Hash, u64)>,
    transactions: HashSet<Hash>,
    fail_reverts: bool,
}

/// Merkle-checkpoint storage backed by plain sets.
///
/// The genesis root is always present as the checkpoint for block zero, so
/// a hard reset can revert to it unconditionally. `set_current_hash` is the
/// hook the simulated execution manager uses to apply block effects.
pub struct SimStorageUnit {
    inner: Mutex<StorageInner>,
}

impl SimStorageUnit {
    /// Storage at the empty world state.
    pub fn new() -> Self {
        let mut checkpoints = HashSet::new();
        checkpoints.insert((GENESIS_MERKLE_ROOT, 0));

        Self {
            inner: Mutex::new(StorageInner {
                current: GENESIS_MERKLE_ROOT,
                last_commit: GENESIS_MERKLE_ROOT,
                checkpoints,
                transactions: HashSet::new(),
                fail_reverts: false,
            }),
        }
    }

    /// Make the full transaction for `digest` available.
    pub fn add_transaction(&self, digest: Hash) {
        self.inner.lock().unwrap().transactions.insert(digest);
    }

    /// Make several transactions available.
    pub fn add_transactions(&self, digests: impl IntoIterator<Item = Hash>) {
        let mut inner = self.inner.lock().unwrap();
        inner.transactions.extend(digests);
    }

    /// Overwrite the current (uncommitted) state root.
    pub fn set_current_hash(&self, hash: Hash) {
        self.inner.lock().unwrap().current = hash;
    }

    /// Force every subsequent revert to fail.
    pub fn set_fail_reverts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_reverts = fail;
    }

    /// True when a checkpoint for `(hash, block_number)` was committed.
    pub fn contains_checkpoint(&self, hash: &Hash, block_number: u64) -> bool {
        self.inner
            .lock()
            .unwrap()
            .checkpoints
            .contains(&(*hash, block_number))
    }

    /// Number of committed checkpoints.
    pub fn checkpoint_count(&self) -> usize {
        self.inner.lock().unwrap().checkpoints.len()
    }
}

impl Default for SimStorageUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageUnit for SimStorageUnit {
    fn current_hash(&self) -> Hash {
        self.inner.lock().unwrap().current
    }

    fn last_commit_hash(&self) -> Hash {
        self.inner.lock().unwrap().last_commit
    }

    fn revert_to_hash(&self, hash: &Hash, block_number: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_reverts {
            return false;
        }
        if !inner.checkpoints.contains(&(*hash, block_number)) {
            return false;
        }

        inner.current = *hash;
        true
    }

    fn hash_exists(&self, hash: &Hash, block_number: u64) -> bool {
        self.inner
            .lock()
            .unwrap()
            .checkpoints
            .contains(&(*hash, block_number))
    }

    fn has_transaction(&self, digest: &Hash) -> bool {
        self.inner.lock().unwrap().transactions.contains(digest)
    }

    fn commit(&self, block_number: u64) {
        let mut inner = self.inner.lock().unwrap();
        let current = inner.current;
        inner.checkpoints.insert((current, block_number));
        inner.last_commit = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_checkpoint_always_revertible() {
        let storage = SimStorageUnit::new();
        storage.set_current_hash(Hash::from_bytes(b"dirty"));

        assert!(storage.revert_to_hash(&GENESIS_MERKLE_ROOT, 0));
        assert_eq!(storage.current_hash(), GENESIS_MERKLE_ROOT);
    }

    #[test]
    fn test_commit_records_checkpoint() {
        let storage = SimStorageUnit::new();
        let state = Hash::from_bytes(b"state after block 1");

        storage.set_current_hash(state);
        assert!(!storage.hash_exists(&state, 1));

        storage.commit(1);
        assert!(storage.hash_exists(&state, 1));
        assert_eq!(storage.last_commit_hash(), state);
        assert!(storage.revert_to_hash(&state, 1));
    }

    #[test]
    fn test_revert_to_unknown_checkpoint_fails() {
        let storage = SimStorageUnit::new();
        assert!(!storage.revert_to_hash(&Hash::from_bytes(b"nope"), 7));
    }

    #[test]
    fn test_fail_reverts_switch() {
        let storage = SimStorageUnit::new();
        storage.set_fail_reverts(true);
        assert!(!storage.revert_to_hash(&GENESIS_MERKLE_ROOT, 0));
    }

    #[test]
    fn test_transaction_presence() {
        let storage = SimStorageUnit::new();
        let digest = Hash::from_bytes(b"tx");

        assert!(!storage.has_transaction(&digest));
        storage.add_transaction(digest);
        assert!(storage.has_transaction(&digest));
    }
}
