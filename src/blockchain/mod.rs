// Blockchain module
//
// This module contains the ledger engine:
// - Block structure and canonical hashing
// - Blockchain (chain + transaction pool)
// - Transactions and signed submissions
// - Cryptography utilities (P-256 wallets, addresses)
// - Proof of work search

pub mod block;
pub mod chain;
pub mod crypto;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, BlockchainError, MiningParams, MINING_REWARD};
pub use crypto::{Address, Wallet};
pub use pow::MINING_DIFFICULTY;
pub use transaction::{Transaction, TransactionError, TransactionRequest};
