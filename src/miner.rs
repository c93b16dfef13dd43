//! Proof-of-work search over a block's nonce.

use crate::blockchain::{Block, Sha256Hash};
use crate::error::ChainError;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot of a running search, sent every `progress_interval` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningProgress {
    pub attempts: u64,
    pub nonce: u64,
}

/// Number of leading zero hex digits in `hash`.
pub fn leading_zero_digits(hash: &Sha256Hash) -> u32 {
    let mut zeros = 0;
    for byte in hash {
        if *byte == 0 {
            zeros += 2;
            continue;
        }
        if *byte < 0x10 {
            zeros += 1;
        }
        break;
    }
    zeros
}

/// Whether the hex form of `hash` starts with `difficulty` zeros.
pub fn meets_difficulty(hash: &Sha256Hash, difficulty: u32) -> bool {
    leading_zero_digits(hash) >= difficulty
}

impl Block {
    /// Increments the nonce until the hash meets `difficulty`.
    ///
    /// Unbounded: for a difficulty above 64 this never returns.
    pub fn mine(&mut self, difficulty: u32) {
        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }

    /// Like [`Block::mine`], but stops with `MiningCancelled` once `cancel` is set
    /// and optionally reports progress. Reports never block the search; on a
    /// bounded channel they are dropped while the queue is full.
    pub fn mine_cancellable(
        &mut self,
        difficulty: u32,
        cancel: &AtomicBool,
        progress: Option<(&Sender<MiningProgress>, u64)>,
    ) -> Result<(), ChainError> {
        let mut attempts: u64 = 0;
        while !meets_difficulty(&self.hash, difficulty) {
            if cancel.load(Ordering::Relaxed) {
                return Err(ChainError::MiningCancelled);
            }
            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;

            if let Some((sender, interval)) = progress {
                if interval > 0 && attempts % interval == 0 {
                    // A full queue or a dropped receiver means nobody is keeping up.
                    let _ = sender.try_send(MiningProgress {
                        attempts,
                        nonce: self.nonce,
                    });
                }
            }
        }
        Ok(())
    }
}
