//! Simulated execution manager.

use crate::storage::SimStorageUnit;
use basalt_ledger::{ExecutionManager, ExecutionState, ScheduleStatus, StorageUnit};
use basalt_types::{BlockBody, Hash, GENESIS_DIGEST};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Deterministic state-transition digest used by the simulated executor.
///
/// Bodies with no transactions leave the state untouched, so executing the
/// genesis block keeps storage at the genesis merkle root. Fixtures use the
/// same function to pre-compute the merkle roots blocks declare.
pub fn apply_block(state: Hash, body: &BlockBody) -> Hash {
    if body.transaction_count() == 0 {
        return state;
    }

    let mut parts: Vec<&[u8]> = vec![state.as_bytes()];
    let digests: Vec<Hash> = body.tx_digests().collect();
    for digest in &digests {
        parts.push(digest.as_bytes());
    }

    Hash::from_parts(&parts)
}

/// Fault injected at the completion point of the next execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFault {
    /// Surface `TransactionsUnavailable` instead of completing.
    Stall,
    /// Surface `ExecutionAborted`.
    Abort,
    /// Surface `ExecutionFailed`.
    Fail,
}

struct ExecInner {
    state: ExecutionState,
    last_processed: Hash,
    pending: Option<BlockBody>,
    polls_remaining: u32,
    refuse_next: Option<ScheduleStatus>,
    completion_fault: Option<CompletionFault>,
    executed: usize,
}

/// Execution manager that applies [`apply_block`] to a shared
/// [`SimStorageUnit`].
///
/// Execution completes after a configurable number of `get_state` polls,
/// which lets tests observe the `Active` window. Faults are injected one
/// shot at a time: `refuse_next_schedule` fails the next submission,
/// `fail_next_execution` corrupts the next completion.
pub struct SimExecutionManager {
    storage: Arc<SimStorageUnit>,
    latency_polls: u32,
    inner: Mutex<ExecInner>,
}

impl SimExecutionManager {
    /// Manager completing on the first poll after scheduling.
    pub fn new(storage: Arc<SimStorageUnit>) -> Self {
        Self::with_latency(storage, 0)
    }

    /// Manager reporting `Active` for `latency_polls` polls before
    /// completing.
    pub fn with_latency(storage: Arc<SimStorageUnit>, latency_polls: u32) -> Self {
        Self {
            storage,
            latency_polls,
            inner: Mutex::new(ExecInner {
                state: ExecutionState::Idle,
                last_processed: GENESIS_DIGEST,
                pending: None,
                polls_remaining: 0,
                refuse_next: None,
                completion_fault: None,
                executed: 0,
            }),
        }
    }

    /// Refuse the next `execute` call with the given verdict.
    pub fn refuse_next_schedule(&self, status: ScheduleStatus) {
        self.inner.lock().unwrap().refuse_next = Some(status);
    }

    /// Corrupt the completion of the next scheduled execution.
    pub fn fail_next_execution(&self, fault: CompletionFault) {
        self.inner.lock().unwrap().completion_fault = Some(fault);
    }

    /// Number of bodies executed to completion.
    pub fn executed_count(&self) -> usize {
        self.inner.lock().unwrap().executed
    }
}

impl ExecutionManager for SimExecutionManager {
    fn execute(&self, body: &BlockBody) -> ScheduleStatus {
        let mut inner = self.inner.lock().unwrap();

        if let Some(status) = inner.refuse_next.take() {
            return status;
        }
        if inner.state == ExecutionState::Active {
            return ScheduleStatus::AlreadyRunning;
        }

        inner.pending = Some(body.clone());
        inner.polls_remaining = self.latency_polls;
        inner.state = ExecutionState::Active;

        ScheduleStatus::Scheduled
    }

    fn get_state(&self) -> ExecutionState {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == ExecutionState::Active {
            if inner.polls_remaining > 0 {
                inner.polls_remaining -= 1;
            } else if let Some(fault) = inner.completion_fault.take() {
                inner.pending = None;
                inner.state = match fault {
                    CompletionFault::Stall => ExecutionState::TransactionsUnavailable,
                    CompletionFault::Abort => ExecutionState::ExecutionAborted,
                    CompletionFault::Fail => ExecutionState::ExecutionFailed,
                };
            } else if let Some(body) = inner.pending.take() {
                let state = apply_block(self.storage.current_hash(), &body);
                self.storage.set_current_hash(state);
                inner.last_processed = body.hash;
                inner.executed += 1;
                inner.state = ExecutionState::Idle;

                debug!(block_hash = %body.hash, state = %state, "simulated execution complete");
            } else {
                inner.state = ExecutionState::Idle;
            }
        }

        inner.state
    }

    fn set_last_processed_block(&self, hash: Hash) {
        self.inner.lock().unwrap().last_processed = hash;
    }

    fn last_processed_block(&self) -> Hash {
        self.inner.lock().unwrap().last_processed
    }

    fn abort(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let was_active = inner.state == ExecutionState::Active;

        inner.pending = None;
        inner.polls_remaining = 0;
        inner.state = ExecutionState::Idle;

        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_types::TransactionLayout;

    fn body_with_tx(seed: u8) -> BlockBody {
        let mut body = BlockBody::default();
        body.hash = Hash::from_bytes(&[seed, 0xAA]);
        body.block_number = 1;
        body.slices = vec![vec![TransactionLayout::new(Hash::from_bytes(&[seed]))]];
        body
    }

    #[test]
    fn test_apply_block_is_deterministic_and_state_dependent() {
        let body = body_with_tx(1);
        let from_genesis = apply_block(Hash::ZERO, &body);
        assert_eq!(from_genesis, apply_block(Hash::ZERO, &body));
        assert_ne!(from_genesis, apply_block(Hash::from_bytes(b"other"), &body));
    }

    #[test]
    fn test_empty_body_preserves_state() {
        let state = Hash::from_bytes(b"state");
        assert_eq!(apply_block(state, &BlockBody::default()), state);
    }

    #[test]
    fn test_execute_applies_to_storage() {
        let storage = Arc::new(SimStorageUnit::new());
        let manager = SimExecutionManager::new(Arc::clone(&storage));
        let body = body_with_tx(1);

        assert_eq!(manager.execute(&body), ScheduleStatus::Scheduled);
        assert_eq!(manager.get_state(), ExecutionState::Idle);

        let expected = apply_block(Hash::ZERO, &body);
        assert_eq!(storage.current_hash(), expected);
        assert_eq!(manager.last_processed_block(), body.hash);
        assert_eq!(manager.executed_count(), 1);
    }

    #[test]
    fn test_latency_window_reports_active() {
        let storage = Arc::new(SimStorageUnit::new());
        let manager = SimExecutionManager::with_latency(Arc::clone(&storage), 2);
        let body = body_with_tx(1);

        manager.execute(&body);
        assert_eq!(manager.get_state(), ExecutionState::Active);
        assert_eq!(manager.get_state(), ExecutionState::Active);
        assert_eq!(manager.get_state(), ExecutionState::Idle);
    }

    #[test]
    fn test_double_schedule_refused() {
        let storage = Arc::new(SimStorageUnit::new());
        let manager = SimExecutionManager::with_latency(Arc::clone(&storage), 5);
        let body = body_with_tx(1);

        assert_eq!(manager.execute(&body), ScheduleStatus::Scheduled);
        assert_eq!(manager.execute(&body), ScheduleStatus::AlreadyRunning);
    }

    #[test]
    fn test_completion_fault_surfaces_and_clears() {
        let storage = Arc::new(SimStorageUnit::new());
        let manager = SimExecutionManager::new(Arc::clone(&storage));
        let body = body_with_tx(1);

        manager.fail_next_execution(CompletionFault::Stall);
        manager.execute(&body);
        assert_eq!(manager.get_state(), ExecutionState::TransactionsUnavailable);

        // A fresh schedule proceeds normally.
        manager.execute(&body);
        assert_eq!(manager.get_state(), ExecutionState::Idle);
        assert_eq!(manager.executed_count(), 1);
    }

    #[test]
    fn test_abort_clears_pending_work() {
        let storage = Arc::new(SimStorageUnit::new());
        let manager = SimExecutionManager::with_latency(Arc::clone(&storage), 5);
        let body = body_with_tx(1);

        manager.execute(&body);
        assert!(manager.abort());
        assert_eq!(manager.get_state(), ExecutionState::Idle);
        assert_eq!(manager.executed_count(), 0);
        assert!(!manager.abort());
    }
}
