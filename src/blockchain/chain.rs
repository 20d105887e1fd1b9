use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use std::fmt;
use std::sync::Arc;

use super::block::{Block, BlockError, BlockHash};
use super::crypto::Address;
use super::pow::{CancelToken, PowError, ProofOfWork};
use super::transaction::{Submission, Transaction, TransactionError};
use crate::network::PeerSource;

/// Amount credited to the node's own address for every mined block
pub const MINING_REWARD: f64 = 1.0;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),

    #[error("Proof of work error: {0}")]
    PowError(#[from] PowError),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),
}

/// Mining parameters fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct MiningParams {
    pub difficulty: usize,
    pub reward: f64,
    pub max_iterations: Option<u64>,
}

/// Chain and pool, guarded together so a commit and its pool update are atomic
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    transaction_pool: Vec<Transaction>,
    /// Bumped by every administrative clear
    pool_generation: u64,
}

/// Represents the blockchain
///
/// Cloning is cheap and every clone shares the same ledger.
///
/// Consistency model: `mine` holds `mining_lock` for its whole run, so at most
/// one block is produced at a time. The nonce search runs without the state
/// lock, so reads and admissions proceed while mining. On commit exactly the
/// snapshotted transactions are removed from the front of the pool; if the
/// pool was cleared during the search they are already gone and whatever was
/// admitted since is left in place.
#[derive(Debug, Clone)]
pub struct Blockchain {
    state: Arc<RwLock<LedgerState>>,

    /// Serializes mining attempts
    mining_lock: Arc<Mutex<()>>,

    /// Known peer addresses, advisory only
    neighbours: Arc<RwLock<Vec<String>>>,

    /// Address receiving mining rewards
    blockchain_address: Address,

    port: u16,

    params: MiningParams,

    cancel: CancelToken,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block
    pub fn with_params(blockchain_address: Address, port: u16, params: MiningParams) -> Result<Self, BlockchainError> {
        let genesis = Block::new(0, Block::default().hash()?, Vec::new());

        Ok(Blockchain {
            state: Arc::new(RwLock::new(LedgerState {
                chain: vec![genesis],
                transaction_pool: Vec::new(),
                pool_generation: 0,
            })),
            mining_lock: Arc::new(Mutex::new(())),
            neighbours: Arc::new(RwLock::new(Vec::new())),
            blockchain_address,
            port,
            params,
            cancel: CancelToken::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn difficulty(&self) -> usize {
        self.params.difficulty
    }

    /// Token that aborts any in-progress nonce search when cancelled
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Result<Block, BlockchainError> {
        self.state
            .read()
            .chain
            .last()
            .cloned()
            .ok_or_else(|| BlockchainError::InvalidChain("chain has no genesis block".to_string()))
    }

    /// Gets the entire blockchain
    pub fn chain(&self) -> Vec<Block> {
        self.state.read().chain.clone()
    }

    /// Copies the pending transactions; the pool itself is not exposed
    pub fn transaction_pool(&self) -> Vec<Transaction> {
        self.state.read().transaction_pool.clone()
    }

    /// Empties the pool
    pub fn clear_transaction_pool(&self) {
        let mut state = self.state.write();
        let dropped = state.transaction_pool.len();
        state.transaction_pool.clear();
        state.pool_generation += 1;
        debug!("Cleared {} pending transactions", dropped);
    }

    /// Verifies a submission and appends it to the pool
    ///
    /// Rewards skip verification; external submissions must carry a valid
    /// signature over the canonical transaction bytes.
    pub fn add_transaction(&self, submission: Submission) -> Result<Transaction, BlockchainError> {
        let transaction = submission.verify()?;

        self.state.write().transaction_pool.push(transaction.clone());
        Ok(transaction)
    }

    /// Mines one block from the current pool
    ///
    /// Returns `Ok(false)` when the pool is empty. Blocks the calling thread for
    /// the duration of the search; run it on a blocking worker.
    pub fn mine(&self) -> Result<bool, BlockchainError> {
        let _mining = self.mining_lock.lock();

        let (transactions, previous_hash, generation) = {
            let state = self.state.read();
            if state.transaction_pool.is_empty() {
                debug!("Nothing to mine");
                return Ok(false);
            }

            let mut transactions = state.transaction_pool.clone();
            let reward = Submission::Reward {
                receiver: self.blockchain_address.clone(),
                value: self.params.reward,
            };
            transactions.push(reward.verify()?);

            let tail = state
                .chain
                .last()
                .ok_or_else(|| BlockchainError::InvalidChain("chain has no genesis block".to_string()))?;

            (transactions, tail.hash()?, state.pool_generation)
        };

        let nonce = ProofOfWork::new(self.params.difficulty)
            .with_max_iterations(self.params.max_iterations)
            .solve(&previous_hash, &transactions, &self.cancel)?;

        let height = self.commit(nonce, previous_hash, transactions, generation);
        info!("action=mining, status=success, height={}, nonce={}", height, nonce);
        Ok(true)
    }

    fn commit(&self, nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>, generation: u64) -> usize {
        // The reward is the last entry and never sat in the pool
        let sealed = transactions.len().saturating_sub(1);

        let mut state = self.state.write();
        state.chain.push(Block::new(nonce, previous_hash, transactions));

        if state.pool_generation == generation {
            let sealed = sealed.min(state.transaction_pool.len());
            state.transaction_pool.drain(..sealed);
        } else {
            debug!("Pool was cleared during mining; leaving {} newer transactions", state.transaction_pool.len());
        }

        state.chain.len()
    }

    /// Sums every committed credit minus every committed debit for an address
    pub fn calculate_total_amount(&self, blockchain_address: &Address) -> f64 {
        let state = self.state.read();
        let mut total_amount = 0.0;

        for transaction in state.chain.iter().flat_map(|block| &block.transactions) {
            if transaction.receiver_address == *blockchain_address {
                total_amount += transaction.value;
            }
            if transaction.sender_address == *blockchain_address {
                total_amount -= transaction.value;
            }
        }

        total_amount
    }

    /// Validates the hash links between consecutive blocks
    pub fn is_valid(&self) -> bool {
        let state = self.state.read();

        state.chain.windows(2).all(|pair| match pair[0].hash() {
            Ok(hash) => pair[1].previous_hash == hash,
            Err(_) => false,
        })
    }

    /// Gets the known peer addresses
    pub fn neighbours(&self) -> Vec<String> {
        self.neighbours.read().clone()
    }

    pub fn set_neighbours(&self, neighbours: Vec<String>) {
        *self.neighbours.write() = neighbours;
    }

    /// Refreshes the peer list from a peer source
    pub fn sync_neighbours(&self, source: &dyn PeerSource) {
        let neighbours = source.discover();
        info!("Neighbours: {:?}", neighbours);
        self.set_neighbours(neighbours);
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        for (i, block) in state.chain.iter().enumerate() {
            writeln!(f, "{} Block {} {}", "=".repeat(25), i, "=".repeat(25))?;
            writeln!(f, "{}", block)?;
        }
        write!(f, "{}", "*".repeat(59))
    }
}
