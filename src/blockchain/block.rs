use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

use super::transaction::Transaction;

/// SHA-256 digest of a block's canonical encoding
pub type BlockHash = [u8; 32];

/// Errors that can occur while encoding a block
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Creation time in nanoseconds since the Unix epoch
    pub timestamp: i64,

    /// Proof of work
    pub nonce: u64,

    /// Hash of the previous block
    #[serde(with = "hex_digest")]
    #[schema(value_type = String, example = "000a3f...")]
    pub previous_hash: BlockHash,

    /// Sealed transactions, in pool order
    pub transactions: Vec<Transaction>,
}

/// Borrowed view of a block in canonical field order
///
/// Both committed blocks and proof-of-work candidates are hashed through this
/// type, so the target is always evaluated against the same bytes.
#[derive(Serialize)]
pub(crate) struct BlockEncoding<'a> {
    pub timestamp: i64,
    pub nonce: u64,
    #[serde(with = "hex_digest")]
    pub previous_hash: &'a BlockHash,
    pub transactions: &'a [Transaction],
}

impl BlockEncoding<'_> {
    pub fn hash(&self) -> Result<BlockHash, BlockError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Sha256::digest(bytes).into())
    }
}

impl Block {
    /// Creates a new block stamped with the current time
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        Block {
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            nonce,
            previous_hash,
            transactions,
        }
    }

    fn encoding(&self) -> BlockEncoding<'_> {
        BlockEncoding {
            timestamp: self.timestamp,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            transactions: &self.transactions,
        }
    }

    /// Calculates the SHA-256 hash of the block
    pub fn hash(&self) -> Result<BlockHash, BlockError> {
        self.encoding().hash()
    }

    /// Calculates the hash as a lowercase hex string
    pub fn hash_hex(&self) -> Result<String, BlockError> {
        Ok(hex::encode(self.hash()?))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "timestamp           {}", self.timestamp)?;
        writeln!(f, "nonce               {}", self.nonce)?;
        write!(f, "previous_hash       {}", hex::encode(self.previous_hash))?;
        for transaction in &self.transactions {
            write!(f, "\n{}", transaction)?;
        }
        Ok(())
    }
}

mod hex_digest {
    use hex::FromHex;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::BlockHash;

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(digest: T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(digest))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BlockHash, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockHash::from_hex(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Address;

    fn sample_transactions() -> Vec<Transaction> {
        vec![
            Transaction::new(Address::from("A"), Address::from("B"), 1.25),
            Transaction::reward(Address::from("miner"), 1.0),
        ]
    }

    #[test]
    fn test_new_block() {
        let block = Block::new(100, [7u8; 32], sample_transactions());

        assert_eq!(block.nonce, 100);
        assert_eq!(block.previous_hash, [7u8; 32]);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.timestamp > 0);
    }

    #[test]
    fn test_canonical_encoding_layout() {
        let block = Block {
            timestamp: 42,
            nonce: 3,
            previous_hash: [0xab; 32],
            transactions: vec![Transaction::new(Address::from("A"), Address::from("B"), 2.5)],
        };

        let expected = format!(
            r#"{{"timestamp":42,"nonce":3,"previous_hash":"{}","transactions":[{{"sender_address":"A","receiver_address":"B","value":2.5}}]}}"#,
            "ab".repeat(32)
        );
        assert_eq!(String::from_utf8(serde_json::to_vec(&block.encoding()).unwrap()).unwrap(), expected);

        // The API representation is the hashed representation
        assert_eq!(serde_json::to_vec(&block).unwrap(), serde_json::to_vec(&block.encoding()).unwrap());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::new(1, [1u8; 32], sample_transactions());
        assert_eq!(block.hash().unwrap(), block.hash().unwrap());
        assert_eq!(block.hash_hex().unwrap().len(), 64);
    }

    #[test]
    fn test_any_field_change_changes_hash() {
        let block = Block::new(1, [1u8; 32], sample_transactions());
        let original = block.hash().unwrap();

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block.clone();
        changed.previous_hash[31] ^= 1;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block.clone();
        changed.transactions[0].value = 1.26;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block;
        changed.transactions.swap(0, 1);
        assert_ne!(changed.hash().unwrap(), original);
    }

    #[test]
    fn test_json_round_trip_restores_every_field() {
        let block = Block::new(9, [0x5a; 32], sample_transactions());
        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, block);
        assert_eq!(decoded.hash().unwrap(), block.hash().unwrap());
    }

    #[test]
    fn test_rejects_short_previous_hash() {
        let json = r#"{"timestamp":0,"nonce":0,"previous_hash":"abcd","transactions":[]}"#;
        assert!(serde_json::from_str::<Block>(json).is_err());
    }

    #[test]
    fn test_default_block_hash_is_stable() {
        let a = Block::default().hash().unwrap();
        let b = Block::default().hash().unwrap();
        assert_eq!(a, b);
    }
}
