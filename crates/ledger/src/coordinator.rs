//! The block coordinator.
//!
//! The coordinator drives the node through the full lifecycle of ingesting,
//! validating, executing and producing blocks. It reconciles the heaviest
//! chain, the last executed block and the committed world-state root while
//! preserving the invariant that committed storage state always corresponds
//! to an executed, validated block on the current chain.
//!
//! It is a single-threaded, tick-driven state machine: each tick performs
//! one bounded unit of work against the collaborators and returns the next
//! state, optionally with a delay hint. Faults never escape a tick; every
//! failure maps to [`CoordinatorState::Reset`], which clears transient
//! state and re-enters synchronization.

use crate::config::CoordinatorConfig;
use crate::miner::NonceMiner;
use crate::traits::{
    BlockPacker, BlockPtr, BlockSink, BlockStatus, ChainStore, ExecutionManager, ExecutionState,
    Miner, ScheduleStatus, StorageUnit, TransactionStatusCache,
};
use arc_swap::ArcSwap;
use basalt_core::{Periodic, StateHandlers, StateMachine, Step};
use basalt_types::{
    Block, BlockBody, Hash, Identity, ProofOfWork, TransactionStatus, GENESIS_DIGEST,
    GENESIS_MERKLE_ROOT,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const TX_SYNC_NOTIFY_INTERVAL: Duration = Duration::from_secs(1);
const EXEC_NOTIFY_INTERVAL: Duration = Duration::from_millis(500);
const NOTIFY_INTERVAL: Duration = Duration::from_secs(10);

const TX_WAIT_DELAY: Duration = Duration::from_millis(200);
const EXEC_WAIT_DELAY: Duration = Duration::from_millis(20);

/// Nonce attempts per proof-search tick.
const PROOF_SEARCH_BUDGET: u64 = 100;

/// States of the coordinator, ordered by lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Reload committed state for the heaviest block after a restart.
    ReloadState,
    /// Walk the chain to find the next block to execute.
    Synchronizing,
    /// Aligned with the heaviest chain; may start producing.
    Synchronized,
    /// Structural validation before execution.
    PreExecBlockValidation,
    /// Wait for the block's transactions to become available.
    WaitForTransactions,
    /// Submit the block to the execution manager.
    ScheduleBlockExecution,
    /// Poll the execution manager until it goes idle.
    WaitForExecution,
    /// Compare the resulting state root against the declared one.
    PostExecBlockValidation,
    /// Fill a fresh candidate block from the mempool.
    PackNewBlock,
    /// Submit the candidate block for execution.
    ExecuteNewBlock,
    /// Poll execution of the candidate block.
    WaitForNewBlockExecution,
    /// Search for a proof-of-work nonce.
    ProofSearch,
    /// Add the sealed block to the chain and broadcast it.
    TransmitBlock,
    /// Clear transient state and return to synchronization.
    Reset,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ReloadState => "Reloading State",
            Self::Synchronizing => "Synchronizing",
            Self::Synchronized => "Synchronized",
            Self::PreExecBlockValidation => "Pre Block Execution Validation",
            Self::WaitForTransactions => "Waiting for Transactions",
            Self::ScheduleBlockExecution => "Schedule Block Execution",
            Self::WaitForExecution => "Waiting for Block Execution",
            Self::PostExecBlockValidation => "Post Block Execution Validation",
            Self::PackNewBlock => "Pack New Block",
            Self::ExecuteNewBlock => "Execute New Block",
            Self::WaitForNewBlockExecution => "Waiting for New Block Execution",
            Self::ProofSearch => "Searching for Proof",
            Self::TransmitBlock => "Transmitting Block",
            Self::Reset => "Reset",
        };
        f.write_str(text)
    }
}

/// Coordinator-internal summary of the execution manager's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The executor finished and is ready for the next block.
    Idle,
    /// The executor is working.
    Running,
    /// The executor cannot make progress (missing transactions).
    Stalled,
    /// The executor aborted or failed.
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stalled => "Stalled",
            Self::Error => "Error",
        };
        f.write_str(text)
    }
}

/// Map the execution manager's raw state to the coordinator's summary.
fn map_execution_state(state: ExecutionState) -> ExecutionStatus {
    match state {
        ExecutionState::Idle => ExecutionStatus::Idle,
        ExecutionState::Active => ExecutionStatus::Running,
        ExecutionState::TransactionsUnavailable => ExecutionStatus::Stalled,
        ExecutionState::ExecutionAborted | ExecutionState::ExecutionFailed => {
            ExecutionStatus::Error
        }
    }
}

/// Lock-free read handle onto the coordinator's last executed block.
///
/// Clone freely and hand to status surfaces; reads never block the
/// coordinator.
#[derive(Clone)]
pub struct ExecutionProgress {
    cell: Arc<ArcSwap<Hash>>,
}

impl ExecutionProgress {
    /// Digest of the last executed block, or [`GENESIS_DIGEST`] when
    /// nothing has been executed.
    pub fn get(&self) -> Hash {
        **self.cell.load()
    }
}

struct CoordinatorCore {
    chain: Arc<dyn ChainStore>,
    execution_manager: Arc<dyn ExecutionManager>,
    storage: Arc<dyn StorageUnit>,
    packer: Arc<dyn BlockPacker>,
    miner: Arc<dyn Miner>,
    sink: Arc<dyn BlockSink>,
    status_cache: Arc<dyn TransactionStatusCache>,

    identity: Identity,
    num_lanes: usize,
    num_slices: usize,
    block_difficulty: u32,
    block_period: Duration,
    mining: bool,
    mining_enabled: bool,

    /// Block being synchronized, validated or executed. Owned by the chain
    /// store, borrowed here.
    current_block: Option<BlockPtr>,
    /// Candidate block being produced. Exclusively owned.
    next_block: Option<Block>,
    /// Transactions the current block still waits for.
    pending_txs: Option<HashSet<Hash>>,
    /// Earliest instant at which the next block may be produced.
    next_block_time: Instant,
    /// Reserved stall counter, cleared on reset.
    stall_count: usize,

    last_executed_block: Arc<ArcSwap<Hash>>,

    tx_wait_periodic: Periodic,
    exec_wait_periodic: Periodic,
    syncing_periodic: Periodic,
}

impl StateHandlers<CoordinatorState> for CoordinatorCore {
    fn on_tick(
        &mut self,
        now: Instant,
        current: CoordinatorState,
        previous: CoordinatorState,
    ) -> Step<CoordinatorState> {
        use CoordinatorState::*;

        match current {
            ReloadState => self.on_reload_state(),
            Synchronizing => self.on_synchronizing(now),
            Synchronized => self.on_synchronized(now, previous),
            PreExecBlockValidation => self.on_pre_exec_block_validation(now),
            WaitForTransactions => self.on_wait_for_transactions(now),
            ScheduleBlockExecution => self.on_schedule_block_execution(now),
            WaitForExecution => self.on_wait_for_execution(now),
            PostExecBlockValidation => self.on_post_exec_block_validation(),
            PackNewBlock => self.on_pack_new_block(now),
            ExecuteNewBlock => self.on_execute_new_block(now),
            WaitForNewBlockExecution => self.on_wait_for_new_block_execution(now),
            ProofSearch => self.on_proof_search(),
            TransmitBlock => self.on_transmit_block(),
            Reset => self.on_reset(now),
        }
    }
}

impl CoordinatorCore {
    /// Entry state: bring storage back in line with the heaviest block.
    fn on_reload_state(&mut self) -> Step<CoordinatorState> {
        if self.current_block.is_none() {
            self.current_block = Some(self.chain.heaviest_block());
        }

        let Some(block) = self.current_block.clone() else {
            return Step::to(CoordinatorState::Reset);
        };

        // Genesis means there is no state to reload; anything else gets
        // reverted to its recorded checkpoint when storage still has it.
        if block.body.previous_hash != GENESIS_DIGEST {
            if self
                .storage
                .revert_to_hash(&block.body.merkle_hash, block.body.block_number)
            {
                self.execution_manager
                    .set_last_processed_block(block.body.hash);
                self.set_last_executed(block.body.hash);

                info!(
                    block_hash = %block.body.hash,
                    block_number = block.body.block_number,
                    "restored state for block"
                );
            } else {
                warn!(
                    block_hash = %block.body.hash,
                    block_number = block.body.block_number,
                    "unable to restore state for block"
                );
            }
        }

        Step::to(CoordinatorState::Reset)
    }

    /// Work out which block to execute next, reverting across reorgs.
    fn on_synchronizing(&mut self, now: Instant) -> Step<CoordinatorState> {
        if self.current_block.is_none() {
            self.current_block = Some(self.chain.heaviest_block());
        }

        let Some(current) = self.current_block.clone() else {
            return Step::to(CoordinatorState::Reset);
        };

        let extra_debug = self.syncing_periodic.poll(now);

        let current_hash = current.body.hash;
        let previous_hash = current.body.previous_hash;
        let last_processed = self.execution_manager.last_processed_block();

        if extra_debug {
            debug!(
                heaviest = %self.chain.heaviest_block_hash(),
                current = %current_hash,
                previous = %previous_hash,
                desired_state = %current.body.merkle_hash,
                current_state = %self.storage.current_hash(),
                committed_state = %self.storage.last_commit_hash(),
                last_processed = %last_processed,
                "synchronization status"
            );
        }

        if last_processed == GENESIS_DIGEST {
            // Nothing has been executed yet: walk back to the start of the
            // chain and begin executing from there.
            if previous_hash == GENESIS_DIGEST {
                return Step::to(CoordinatorState::PreExecBlockValidation);
            }

            match self.chain.get_block(&previous_hash) {
                Some(previous) => {
                    self.current_block = Some(previous);
                    Step::to(CoordinatorState::Synchronizing)
                }
                None => {
                    warn!(block_hash = %current_hash, "unable to look up previous block");
                    Step::to(CoordinatorState::Reset)
                }
            }
        } else if current_hash == last_processed {
            Step::to(CoordinatorState::Synchronized)
        } else {
            let Some(path) = self
                .chain
                .path_to_common_ancestor(&current_hash, &last_processed)
            else {
                warn!(block_hash = %current_hash, "unable to look up common ancestor");
                return Step::to(CoordinatorState::Reset);
            };

            // The path is only requested when current != last processed, so
            // it must contain the divergent block and the ancestor.
            if path.len() < 2 {
                warn!(block_hash = %current_hash, "common ancestor path unexpectedly short");
                return Step::to(CoordinatorState::Reset);
            }

            let common_parent = Arc::clone(&path[path.len() - 1]);
            let next_block = Arc::clone(&path[path.len() - 2]);

            if extra_debug {
                let completed = next_block.body.block_number;
                let total = current.body.block_number.max(1);
                info!(
                    ancestor = %common_parent.body.hash,
                    next = %next_block.body.hash,
                    percent = (completed * 100) as f64 / total as f64,
                    "synchronisation of chain in progress"
                );
            }

            // The ancestor should always have been executed before; if its
            // checkpoint is gone the only safe option is a full re-sync
            // from genesis.
            if !self
                .storage
                .hash_exists(&common_parent.body.merkle_hash, common_parent.body.block_number)
            {
                error!(
                    block_hash = %current_hash,
                    ancestor = %common_parent.body.hash,
                    block_number = common_parent.body.block_number,
                    "ancestor state checkpoint cannot be retrieved"
                );

                self.execution_manager
                    .set_last_processed_block(GENESIS_DIGEST);
                self.set_last_executed(GENESIS_DIGEST);
                if !self.storage.revert_to_hash(&GENESIS_MERKLE_ROOT, 0) {
                    error!("unable to revert back to genesis");
                }

                return Step::to(CoordinatorState::Reset);
            }

            if !self
                .storage
                .revert_to_hash(&common_parent.body.merkle_hash, common_parent.body.block_number)
            {
                error!(block_hash = %current_hash, "unable to restore state for block");
                return Step::to(CoordinatorState::Reset);
            }

            self.current_block = Some(next_block);
            Step::to(CoordinatorState::PreExecBlockValidation)
        }
    }

    /// Watch for reorgs and decide whether to produce a block.
    fn on_synchronized(
        &mut self,
        now: Instant,
        previous: CoordinatorState,
    ) -> Step<CoordinatorState> {
        // Make sure the sync progress log is quiet while we are synced.
        self.syncing_periodic.reset(now);

        let Some(current) = self.current_block.clone() else {
            return Step::to(CoordinatorState::Reset);
        };

        if self.chain.heaviest_block_hash() != current.body.hash {
            // The chain has moved on; re-evaluate it.
            return Step::to(CoordinatorState::Reset);
        }

        if self.mining && self.mining_enabled && now >= self.next_block_time {
            self.next_block = Some(Block {
                body: BlockBody {
                    previous_hash: current.body.hash,
                    block_number: current.body.block_number + 1,
                    miner: self.identity.clone(),
                    ..BlockBody::default()
                },
                proof: ProofOfWork::with_target(self.block_difficulty),
            });

            // The candidate supersedes the borrowed chain block.
            self.current_block = None;

            return Step::to(CoordinatorState::PackNewBlock);
        }

        if previous == CoordinatorState::Synchronizing {
            info!(
                block_hash = %current.body.hash,
                block_number = current.body.block_number,
                previous_hash = %current.body.previous_hash,
                "chain sync complete"
            );
        }

        Step::to(CoordinatorState::Synchronized)
    }

    /// Structural checks that do not need execution.
    fn on_pre_exec_block_validation(&mut self, now: Instant) -> Step<CoordinatorState> {
        let Some(current) = self.current_block.clone() else {
            return Step::to(CoordinatorState::Reset);
        };

        let body = &current.body;
        let is_genesis = body.previous_hash == GENESIS_DIGEST;

        if !is_genesis {
            let Some(previous) = self.chain.get_block(&body.previous_hash) else {
                warn!(
                    block_hash = %body.hash,
                    "block validation failed: no previous block in chain"
                );
                return self.remove_invalid_block(&body.hash);
            };

            let expected_block_number = previous.body.block_number + 1;
            if expected_block_number != body.block_number {
                warn!(
                    block_hash = %body.hash,
                    expected = expected_block_number,
                    actual = body.block_number,
                    "block validation failed: block number mismatch"
                );
                return self.remove_invalid_block(&body.hash);
            }

            if !body.miner.is_well_formed() {
                warn!(
                    block_hash = %body.hash,
                    miner_len = body.miner.len(),
                    "block validation failed: miner identity size mismatch"
                );
                return self.remove_invalid_block(&body.hash);
            }

            let lanes_match = body.log2_num_lanes < usize::BITS
                && self.num_lanes == 1usize << body.log2_num_lanes;
            if !lanes_match {
                warn!(
                    block_hash = %body.hash,
                    log2_num_lanes = body.log2_num_lanes,
                    expected = self.num_lanes,
                    "block validation failed: lane count mismatch"
                );
                return self.remove_invalid_block(&body.hash);
            }

            if self.num_slices != body.slices.len() {
                warn!(
                    block_hash = %body.hash,
                    slices = body.slices.len(),
                    expected = self.num_slices,
                    "block validation failed: slice count mismatch"
                );
                return self.remove_invalid_block(&body.hash);
            }
        }

        // The digest width itself is enforced by the Hash type.

        self.tx_wait_periodic.reset(now);
        Step::to(CoordinatorState::WaitForTransactions)
    }

    /// Wait until every transaction in the block is available locally.
    fn on_wait_for_transactions(&mut self, now: Instant) -> Step<CoordinatorState> {
        let Some(current) = self.current_block.clone() else {
            return Step::to(CoordinatorState::Reset);
        };

        let storage = &self.storage;
        let pending = self
            .pending_txs
            .get_or_insert_with(|| current.body.tx_digests().collect());

        pending.retain(|digest| !storage.has_transaction(digest));

        if pending.is_empty() {
            debug!("all transactions have been synchronised");
            self.pending_txs = None;
            return Step::to(CoordinatorState::ScheduleBlockExecution);
        }

        if self.tx_wait_periodic.poll(now) {
            info!(remaining = pending.len(), "waiting for transactions to sync");
        }

        Step::delay_for(CoordinatorState::WaitForTransactions, TX_WAIT_DELAY)
    }

    fn on_schedule_block_execution(&mut self, now: Instant) -> Step<CoordinatorState> {
        if self.schedule_current_block() {
            self.exec_wait_periodic.reset(now);
            Step::to(CoordinatorState::WaitForExecution)
        } else {
            Step::to(CoordinatorState::Reset)
        }
    }

    fn on_wait_for_execution(&mut self, now: Instant) -> Step<CoordinatorState> {
        match self.query_executor_status() {
            ExecutionStatus::Idle => Step::to(CoordinatorState::PostExecBlockValidation),
            ExecutionStatus::Running => {
                if self.exec_wait_periodic.poll(now) {
                    if let Some(current) = &self.current_block {
                        info!(
                            block_hash = %current.body.hash,
                            "waiting for execution to complete"
                        );
                    }
                }
                Step::delay_for(CoordinatorState::WaitForExecution, EXEC_WAIT_DELAY)
            }
            ExecutionStatus::Stalled | ExecutionStatus::Error => Step::to(CoordinatorState::Reset),
        }
    }

    /// Compare the executed state root against the block's declared one.
    fn on_post_exec_block_validation(&mut self) -> Step<CoordinatorState> {
        let Some(current) = self.current_block.clone() else {
            return Step::to(CoordinatorState::Reset);
        };

        let state_hash = self.storage.current_hash();

        let invalid_block = current.body.previous_hash != GENESIS_DIGEST
            && state_hash != current.body.merkle_hash;

        if invalid_block {
            warn!(
                block_hash = %current.body.hash,
                expected = %current.body.merkle_hash,
                actual = %state_hash,
                "block validation failed: merkle hash mismatch"
            );

            // Restore the previous block's state; a cascading failure means
            // a full re-sync from genesis.
            let mut revert_successful = false;

            if let Some(previous) = self.chain.get_block(&current.body.previous_hash) {
                if self
                    .storage
                    .revert_to_hash(&previous.body.merkle_hash, previous.body.block_number)
                {
                    self.execution_manager
                        .set_last_processed_block(previous.body.hash);
                    self.set_last_executed(previous.body.hash);
                    revert_successful = true;
                }
            }

            if !revert_successful {
                if !self.storage.revert_to_hash(&GENESIS_MERKLE_ROOT, 0) {
                    error!("unable to revert back to genesis");
                }
                self.execution_manager
                    .set_last_processed_block(GENESIS_DIGEST);
                self.set_last_executed(GENESIS_DIGEST);
            }

            self.chain.remove_block(&current.body.hash);
        } else {
            self.update_tx_status(&current);
            self.storage.commit(current.body.block_number);
            self.set_last_executed(current.body.hash);

            debug!(
                block_hash = %current.body.hash,
                block_number = current.body.block_number,
                state = %state_hash,
                "block executed and committed"
            );
        }

        Step::to(CoordinatorState::Reset)
    }

    /// Fill the candidate block from the mempool.
    fn on_pack_new_block(&mut self, now: Instant) -> Step<CoordinatorState> {
        let Some(mut block) = self.next_block.take() else {
            error!("unable to pack empty next block");
            return Step::to(CoordinatorState::Reset);
        };

        match self
            .packer
            .generate_block(&mut block, self.num_lanes, self.num_slices, self.chain.as_ref())
        {
            Ok(()) => {
                self.next_block = Some(block);
                self.update_next_block_time(now);
                Step::to(CoordinatorState::ExecuteNewBlock)
            }
            Err(err) => {
                error!(error = %err, "error generated performing block packing");
                Step::to(CoordinatorState::Reset)
            }
        }
    }

    fn on_execute_new_block(&mut self, now: Instant) -> Step<CoordinatorState> {
        if self.schedule_next_block() {
            self.exec_wait_periodic.reset(now);
            Step::to(CoordinatorState::WaitForNewBlockExecution)
        } else {
            Step::to(CoordinatorState::Reset)
        }
    }

    fn on_wait_for_new_block_execution(&mut self, now: Instant) -> Step<CoordinatorState> {
        match self.query_executor_status() {
            ExecutionStatus::Idle => {
                let Some(block) = self.next_block.as_mut() else {
                    return Step::to(CoordinatorState::Reset);
                };

                // The merkle root only becomes known once the candidate has
                // executed.
                block.body.merkle_hash = self.storage.current_hash();
                debug!(merkle_hash = %block.body.merkle_hash, "candidate block executed");

                self.storage.commit(block.body.block_number);
                Step::to(CoordinatorState::ProofSearch)
            }
            ExecutionStatus::Running => {
                if self.exec_wait_periodic.poll(now) {
                    if let Some(block) = &self.next_block {
                        warn!(
                            following = %block.body.previous_hash,
                            "waiting for new block execution"
                        );
                    }
                }
                Step::delay_for(CoordinatorState::WaitForNewBlockExecution, EXEC_WAIT_DELAY)
            }
            ExecutionStatus::Stalled | ExecutionStatus::Error => Step::to(CoordinatorState::Reset),
        }
    }

    fn on_proof_search(&mut self) -> Step<CoordinatorState> {
        let Some(block) = self.next_block.as_mut() else {
            return Step::to(CoordinatorState::Reset);
        };

        if self.miner.mine(block, PROOF_SEARCH_BUDGET) {
            block.update_digest();
            debug!(block_hash = %block.body.hash, "sealed new block");

            // The execution manager recorded the candidate before its digest
            // was known; fix up its notion of the last processed block.
            self.execution_manager
                .set_last_processed_block(block.body.hash);

            return Step::to(CoordinatorState::TransmitBlock);
        }

        Step::to(CoordinatorState::ProofSearch)
    }

    fn on_transmit_block(&mut self) -> Step<CoordinatorState> {
        let Some(block) = self.next_block.take() else {
            return Step::to(CoordinatorState::Reset);
        };

        match self.chain.add_block(block.clone()) {
            BlockStatus::Added => {
                info!(
                    block_hash = %block.body.hash,
                    txs = block.transaction_count(),
                    "generated new block"
                );

                self.update_tx_status(&block);
                self.set_last_executed(block.body.hash);

                if let Err(err) = self.sink.on_block(&block) {
                    warn!(error = %err, "error transmitting verified block");
                }
            }
            status => {
                warn!(
                    block_hash = %block.body.hash,
                    status = %status,
                    "unable to add generated block to chain"
                );
            }
        }

        Step::to(CoordinatorState::Reset)
    }

    /// Clear transient state and re-enter synchronization.
    fn on_reset(&mut self, now: Instant) -> Step<CoordinatorState> {
        self.current_block = None;
        self.next_block = None;
        self.pending_txs = None;
        self.stall_count = 0;

        self.update_next_block_time(now);

        Step::to(CoordinatorState::Synchronizing)
    }

    fn schedule_current_block(&self) -> bool {
        match &self.current_block {
            Some(block) => self.schedule_block(block),
            None => {
                error!("unable to execute empty current block");
                false
            }
        }
    }

    fn schedule_next_block(&self) -> bool {
        match &self.next_block {
            Some(block) => self.schedule_block(block),
            None => {
                error!("unable to execute empty next block");
                false
            }
        }
    }

    /// Submit a block body for execution, logging the failing verdict.
    fn schedule_block(&self, block: &Block) -> bool {
        debug!(block_hash = %block.body.hash, "attempting execution of block");

        match self.execution_manager.execute(&block.body) {
            ScheduleStatus::Scheduled => true,
            status => {
                error!(status = %status, "execution engine refused the block");
                false
            }
        }
    }

    fn query_executor_status(&self) -> ExecutionStatus {
        let raw = self.execution_manager.get_state();
        let status = map_execution_state(raw);

        if status == ExecutionStatus::Error {
            warn!(state = %raw, "execution in error state");
        }

        status
    }

    /// Mark every transaction in the block as executed.
    fn update_tx_status(&self, block: &Block) {
        for digest in block.body.tx_digests() {
            self.status_cache.update(digest, TransactionStatus::Executed);
        }
    }

    fn update_next_block_time(&mut self, now: Instant) {
        self.next_block_time = now + self.block_period;
    }

    fn set_last_executed(&self, hash: Hash) {
        self.last_executed_block.store(Arc::new(hash));
    }

    fn remove_invalid_block(&self, hash: &Hash) -> Step<CoordinatorState> {
        self.chain.remove_block(hash);
        Step::to(CoordinatorState::Reset)
    }
}

/// The block coordinator: a tick-driven state machine over the chain,
/// storage and execution collaborators.
pub struct BlockCoordinator {
    machine: StateMachine<CoordinatorState>,
    core: CoordinatorCore,
}

impl BlockCoordinator {
    /// Create a coordinator over the given collaborators.
    ///
    /// The default proof-of-work searcher is a [`NonceMiner`]; override it
    /// with [`BlockCoordinator::with_miner`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<dyn ChainStore>,
        execution_manager: Arc<dyn ExecutionManager>,
        storage: Arc<dyn StorageUnit>,
        packer: Arc<dyn BlockPacker>,
        sink: Arc<dyn BlockSink>,
        status_cache: Arc<dyn TransactionStatusCache>,
        config: CoordinatorConfig,
    ) -> Self {
        debug_assert!(config.num_lanes.is_power_of_two());

        let mut machine = StateMachine::new("BlockCoordinator", CoordinatorState::ReloadState);

        // Rate-limited state logging, composed around the observer hook.
        let mut periodic_print = Periodic::new(NOTIFY_INTERVAL);
        machine.on_state_change(move |current, previous, now| {
            if periodic_print.poll(now) {
                info!(current = %current, previous = %previous, "current state");
            }
        });

        let core = CoordinatorCore {
            chain,
            execution_manager,
            storage,
            packer,
            miner: Arc::new(NonceMiner::new()),
            sink,
            status_cache,
            identity: config.identity,
            num_lanes: config.num_lanes,
            num_slices: config.num_slices,
            block_difficulty: config.block_difficulty,
            block_period: config.block_period,
            mining: config.mining,
            mining_enabled: true,
            current_block: None,
            next_block: None,
            pending_txs: None,
            next_block_time: Instant::now(),
            stall_count: 0,
            last_executed_block: Arc::new(ArcSwap::from_pointee(GENESIS_DIGEST)),
            tx_wait_periodic: Periodic::new(TX_SYNC_NOTIFY_INTERVAL),
            exec_wait_periodic: Periodic::new(EXEC_NOTIFY_INTERVAL),
            syncing_periodic: Periodic::new(NOTIFY_INTERVAL),
        };

        Self { machine, core }
    }

    /// Replace the proof-of-work searcher.
    pub fn with_miner(mut self, miner: Arc<dyn Miner>) -> Self {
        self.core.miner = miner;
        self
    }

    /// Run at most one state handler. Returns `false` when a delay hint is
    /// still pending or the coordinator has been shut down.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.machine.tick(now, &mut self.core)
    }

    /// Drive the coordinator until `running` goes false.
    ///
    /// Sleeps for the pending delay hint (capped at `idle`) whenever a tick
    /// performs no work.
    pub fn run_while(&mut self, running: &AtomicBool, idle: Duration) {
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if !self.tick(now) {
                let pause = self
                    .machine
                    .delay_remaining(now)
                    .map_or(idle, |remaining| remaining.min(idle));
                std::thread::sleep(pause);
            }
        }
    }

    /// Shut the state machine down; subsequent ticks do nothing.
    pub fn shutdown(&mut self) {
        self.machine.reset();
    }

    /// The current state.
    pub fn state(&self) -> CoordinatorState {
        self.machine.state()
    }

    /// The state before the last transition.
    pub fn previous_state(&self) -> CoordinatorState {
        self.machine.previous_state()
    }

    /// Time remaining on the pending delay hint, if any.
    pub fn delay_remaining(&self, now: Instant) -> Option<Duration> {
        self.machine.delay_remaining(now)
    }

    /// Register an observer for state transitions.
    pub fn on_state_change(
        &mut self,
        observer: impl FnMut(CoordinatorState, CoordinatorState, Instant) + Send + 'static,
    ) {
        self.machine.on_state_change(observer);
    }

    /// Digest of the last executed block.
    pub fn last_executed_block(&self) -> Hash {
        **self.core.last_executed_block.load()
    }

    /// Lock-free handle for other subsystems to read execution progress.
    pub fn progress(&self) -> ExecutionProgress {
        ExecutionProgress {
            cell: Arc::clone(&self.core.last_executed_block),
        }
    }

    /// The block currently being synchronized or executed, if any.
    pub fn current_block(&self) -> Option<BlockPtr> {
        self.core.current_block.clone()
    }

    /// Number of transactions the current block still waits for.
    pub fn pending_transaction_count(&self) -> usize {
        self.core.pending_txs.as_ref().map_or(0, HashSet::len)
    }

    /// Runtime switch for block production.
    pub fn set_mining_enabled(&mut self, enabled: bool) {
        self.core.mining_enabled = enabled;
    }

    /// True when block production is currently allowed.
    pub fn is_mining_enabled(&self) -> bool {
        self.core.mining_enabled
    }

    /// Force the block interval to expire so the next synchronized tick may
    /// produce a block.
    pub fn trigger_block_generation(&mut self, now: Instant) {
        if self.core.mining {
            self.core.next_block_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(CoordinatorState::ReloadState.to_string(), "Reloading State");
        assert_eq!(
            CoordinatorState::WaitForTransactions.to_string(),
            "Waiting for Transactions"
        );
        assert_eq!(CoordinatorState::ProofSearch.to_string(), "Searching for Proof");
        assert_eq!(CoordinatorState::Reset.to_string(), "Reset");
    }

    #[test]
    fn test_execution_state_mapping() {
        assert_eq!(map_execution_state(ExecutionState::Idle), ExecutionStatus::Idle);
        assert_eq!(
            map_execution_state(ExecutionState::Active),
            ExecutionStatus::Running
        );
        assert_eq!(
            map_execution_state(ExecutionState::TransactionsUnavailable),
            ExecutionStatus::Stalled
        );
        assert_eq!(
            map_execution_state(ExecutionState::ExecutionAborted),
            ExecutionStatus::Error
        );
        assert_eq!(
            map_execution_state(ExecutionState::ExecutionFailed),
            ExecutionStatus::Error
        );
    }
}
