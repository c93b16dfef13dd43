//! Shared access to one ledger from several callers, with mining on a worker thread.

use crate::blockchain::{Balance, Block, Blockchain};
use crate::crypto::Address;
use crate::error::ChainError;
use crate::miner::MiningProgress;
use crate::transaction::Transaction;
use crossbeam_channel::Receiver;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{info, warn};

const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// A ledger behind a single-writer lock.
///
/// Readers share the lock; `add_transaction` and block commits take it exclusively.
/// At most one mining job runs at a time, and the proof-of-work search itself
/// runs without holding the lock.
#[derive(Clone)]
pub struct LedgerNode {
    blockchain: Arc<RwLock<Blockchain>>,
    mining: Arc<AtomicBool>,
    progress_interval: u64,
}

/// Clears the node's mining flag when the job ends, however it ends.
struct MiningGuard(Arc<AtomicBool>);

impl Drop for MiningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MiningHandle {
    cancel: Arc<AtomicBool>,
    progress: Receiver<MiningProgress>,
    handle: JoinHandle<Result<Block, ChainError>>,
}

impl MiningHandle {
    /// Asks the worker to stop. A cancelled job leaves the chain untouched and
    /// returns its transfers to the pending pool.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Progress reports from the worker. Holds at most one unread report;
    /// newer ones are dropped until it is taken.
    pub fn progress(&self) -> &Receiver<MiningProgress> {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and returns the committed block.
    pub fn join(self) -> Result<Block, ChainError> {
        self.handle.join().map_err(|_| ChainError::WorkerPanicked)?
    }
}

impl LedgerNode {
    pub fn new(blockchain: Blockchain) -> Self {
        Self::with_progress_interval(blockchain, DEFAULT_PROGRESS_INTERVAL)
    }

    pub fn with_progress_interval(blockchain: Blockchain, progress_interval: u64) -> Self {
        LedgerNode {
            blockchain: Arc::new(RwLock::new(blockchain)),
            mining: Arc::new(AtomicBool::new(false)),
            progress_interval,
        }
    }

    /// Read access for callers that need more than the shortcuts below.
    pub fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.blockchain.read()
    }

    pub fn add_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        self.blockchain.write().add_transaction(tx)
    }

    pub fn balance_of(&self, address: &Address) -> Balance {
        self.blockchain.read().balance_of(address)
    }

    pub fn transactions_for(&self, address: &Address) -> Vec<Transaction> {
        self.blockchain
            .read()
            .transactions_for(address)
            .cloned()
            .collect()
    }

    pub fn is_valid(&self) -> Result<bool, ChainError> {
        self.blockchain.read().is_valid()
    }

    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::Acquire)
    }

    /// Mines the pending pool on a worker and waits for the result.
    pub fn mine_pending_transactions(&self, reward_address: &Address) -> Result<Block, ChainError> {
        self.spawn_miner(reward_address.clone())?.join()
    }

    /// Snapshots the pending pool and starts mining it on a worker thread.
    ///
    /// Transactions submitted while the worker runs wait for the next block.
    pub fn spawn_miner(&self, reward_address: Address) -> Result<MiningHandle, ChainError> {
        if self
            .mining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChainError::MiningInProgress);
        }
        let guard = MiningGuard(self.mining.clone());

        let (candidate, difficulty, height) = {
            let mut chain = self.blockchain.write();
            let candidate = chain.prepare_candidate(&reward_address);
            (candidate, chain.difficulty(), chain.blocks().len())
        };
        info!(
            "mining block {} with {} transactions at difficulty {}",
            height,
            candidate.transactions.len(),
            difficulty
        );

        let cancel = Arc::new(AtomicBool::new(false));
        // One slot, so an unread report caps the queue instead of growing it.
        let (sender, progress) = crossbeam_channel::bounded(1);
        let blockchain = self.blockchain.clone();
        let interval = self.progress_interval;
        let cancel_flag = cancel.clone();

        let handle = thread::spawn(move || {
            let _guard = guard;
            let mut block = candidate;
            let started = Instant::now();

            if let Err(e) = block.mine_cancellable(difficulty, &cancel_flag, Some((&sender, interval))) {
                warn!("mining block {} stopped: {}", height, e);
                blockchain.write().restore_pending(block);
                return Err(e);
            }
            info!(
                "mined block {} (nonce {}, hash {}) in {:?}",
                height,
                block.nonce,
                block.hash_str(),
                started.elapsed()
            );

            let mut chain = blockchain.write();
            let fallback = block.clone();
            match chain.commit_block(block) {
                Ok(committed) => Ok(committed.clone()),
                Err(e) => {
                    warn!("mined block {} was not committed: {}", height, e);
                    chain.restore_pending(fallback);
                    Err(e)
                }
            }
        });

        Ok(MiningHandle {
            cancel,
            progress,
            handle,
        })
    }
}
