//! Node wiring: the ledger plus its background loops and peer notifications

use log::{error, info, warn};
use thiserror::Error;
use tokio::task::JoinError;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::{Blockchain, BlockchainError, Transaction, TransactionRequest};
use crate::network::{PeerClient, PeerSource};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Blockchain error: {0}")]
    BlockchainError(#[from] BlockchainError),

    #[error("Worker failed: {0}")]
    WorkerError(#[from] JoinError),
}

/// Shared handle used by the HTTP layer and the background loops
#[derive(Debug, Clone)]
pub struct Node {
    blockchain: Blockchain,
    peers: PeerClient,
    mining_interval: Duration,
    is_mining: Arc<AtomicBool>,
}

impl Node {
    pub fn new(blockchain: Blockchain, peers: PeerClient, mining_interval: Duration) -> Self {
        Node {
            blockchain,
            peers,
            mining_interval,
            is_mining: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    /// Admits a transaction from a client and replicates it to peers
    pub fn create_transaction(&self, request: TransactionRequest) -> Result<Transaction, NodeError> {
        let transaction = self.add_transaction(&request)?;

        let neighbours = self.blockchain.neighbours();
        if !neighbours.is_empty() {
            let peers = self.peers.clone();
            tokio::spawn(async move {
                peers.broadcast_transaction(&neighbours, &request).await;
            });
        }

        Ok(transaction)
    }

    /// Admits a transaction replicated from a peer; nothing is forwarded
    pub fn add_transaction(&self, request: &TransactionRequest) -> Result<Transaction, NodeError> {
        let submission = request.validate().map_err(BlockchainError::from)?;
        Ok(self.blockchain.add_transaction(submission)?)
    }

    pub fn clear_transaction_pool(&self) {
        self.blockchain.clear_transaction_pool();
    }

    /// Runs one mining cycle on a blocking worker
    ///
    /// After a block is committed, peers are told to clear their pools.
    pub async fn mine(&self) -> Result<bool, NodeError> {
        let blockchain = self.blockchain.clone();
        let mined = tokio::task::spawn_blocking(move || blockchain.mine()).await??;

        if mined {
            let neighbours = self.blockchain.neighbours();
            if !neighbours.is_empty() {
                let peers = self.peers.clone();
                tokio::spawn(async move {
                    peers.broadcast_clear(&neighbours).await;
                });
            }
        }

        Ok(mined)
    }

    /// Starts mining on a fixed interval; returns false if already running
    pub fn start_mining(&self) -> bool {
        if self
            .is_mining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let node = self.clone();
        tokio::spawn(async move {
            info!("Mining every {:?}", node.mining_interval);
            let mut ticker = tokio::time::interval(node.mining_interval);

            loop {
                ticker.tick().await;
                if node.blockchain.cancel_token().is_cancelled() {
                    break;
                }
                if let Err(err) = node.mine().await {
                    error!("Mining failed: {}", err);
                }
            }

            node.is_mining.store(false, Ordering::SeqCst);
        });

        true
    }

    /// Refreshes the neighbour list on a fixed interval
    pub fn spawn_neighbour_sync(&self, source: Arc<dyn PeerSource>, interval: Duration) {
        let blockchain = self.blockchain.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                if blockchain.cancel_token().is_cancelled() {
                    break;
                }

                let worker = blockchain.clone();
                let source = Arc::clone(&source);
                if let Err(err) = tokio::task::spawn_blocking(move || worker.sync_neighbours(source.as_ref())).await {
                    warn!("Neighbour sync failed: {}", err);
                }
            }
        });
    }

    /// Stops the background loops and any in-progress nonce search
    pub fn shutdown(&self) {
        self.blockchain.cancel_token().cancel();
    }
}
