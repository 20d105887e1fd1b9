use log::debug;
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::block::{BlockEncoding, BlockError, BlockHash};
use super::transaction::Transaction;

/// Leading zero hex characters required of a block hash
pub const MINING_DIFFICULTY: usize = 3;

/// Hex characters in a SHA-256 digest; no harder target is reachable
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can end a nonce search without a result
#[derive(Debug, Error)]
pub enum PowError {
    #[error("Search cancelled after {iterations} attempts")]
    Cancelled { iterations: u64 },

    #[error("No valid nonce within {iterations} attempts")]
    Exhausted { iterations: u64 },

    #[error("Difficulty {0} exceeds the digest length")]
    UnreachableDifficulty(usize),

    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),
}

/// Shared flag that stops an in-progress search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Checks that the hex form of a hash starts with `difficulty` zeros
pub fn meets_difficulty(hash: &BlockHash, difficulty: usize) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }
    // Each byte is two hex characters; an odd difficulty checks the high nibble of the last byte
    let full_bytes = difficulty / 2;
    hash[..full_bytes].iter().all(|b| *b == 0) && (difficulty % 2 == 0 || hash[full_bytes] >> 4 == 0)
}

/// Brute-force nonce search over a fixed previous hash and transaction set
#[derive(Debug, Clone, Copy)]
pub struct ProofOfWork {
    difficulty: usize,
    max_iterations: Option<u64>,
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty,
            max_iterations: None,
        }
    }

    /// Bounds the number of nonces tried; `None` searches until found or cancelled
    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Checks a nonce against the candidate block
    ///
    /// The candidate carries a zero timestamp so that only the nonce varies
    /// between attempts.
    pub fn valid_proof(
        &self,
        nonce: u64,
        previous_hash: &BlockHash,
        transactions: &[Transaction],
    ) -> Result<bool, BlockError> {
        let candidate = BlockEncoding {
            timestamp: 0,
            nonce,
            previous_hash,
            transactions,
        };
        Ok(meets_difficulty(&candidate.hash()?, self.difficulty))
    }

    /// Finds the smallest nonce, starting at 0, whose candidate meets the target
    pub fn solve(
        &self,
        previous_hash: &BlockHash,
        transactions: &[Transaction],
        cancel: &CancelToken,
    ) -> Result<u64, PowError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(PowError::UnreachableDifficulty(self.difficulty));
        }

        let mut nonce: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(PowError::Cancelled { iterations: nonce });
            }
            if self.max_iterations.is_some_and(|max| nonce >= max) {
                return Err(PowError::Exhausted { iterations: nonce });
            }

            if self.valid_proof(nonce, previous_hash, transactions)? {
                debug!("Found nonce {} at difficulty {}", nonce, self.difficulty);
                return Ok(nonce);
            }

            nonce += 1;
        }
    }
}
