use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, PublicKey, Wallet};

/// Sender recorded on reward transactions; never a real wallet address
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Sender address {0} is reserved for mining rewards")]
    ReservedSender(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Represents a value transfer
///
/// Field order is the canonical encoding used for signing and block hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address
    #[schema(value_type = String)]
    pub sender_address: Address,

    /// Receiver's address
    #[schema(value_type = String)]
    pub receiver_address: Address,

    /// Amount being transferred
    pub value: f64,
}

impl Transaction {
    pub fn new(sender_address: Address, receiver_address: Address, value: f64) -> Self {
        Transaction {
            sender_address,
            receiver_address,
            value,
        }
    }

    /// Creates a reward paid by the system sender
    pub fn reward(receiver_address: Address, value: f64) -> Self {
        Transaction::new(Address::from(MINING_SENDER), receiver_address, value)
    }

    /// The exact bytes that are signed and verified
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Signs the canonical bytes with a wallet
    pub fn sign(&self, wallet: &Wallet) -> Result<DigitalSignature, TransactionError> {
        Ok(wallet.sign(&self.to_bytes()?)?)
    }

    /// Verifies a signature over the canonical bytes
    pub fn verify(&self, signature: &DigitalSignature, public_key: &PublicKey) -> bool {
        match self.to_bytes() {
            Ok(message) => verify_signature(&message, signature, public_key),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(40))?;
        writeln!(f, " sender_address      {}", self.sender_address)?;
        writeln!(f, " receiver_address    {}", self.receiver_address)?;
        write!(f, " value               {:.18}", self.value)
    }
}

/// A transaction offered to the pool
///
/// Only `External` submissions carry key material and are verified; rewards
/// are issued by the node itself.
#[derive(Debug, Clone)]
pub enum Submission {
    External {
        sender: Address,
        receiver: Address,
        value: f64,
        public_key: PublicKey,
        signature: DigitalSignature,
    },
    Reward {
        receiver: Address,
        value: f64,
    },
}

impl Submission {
    /// The record that enters the pool if the submission is accepted
    pub fn transaction(&self) -> Transaction {
        match self {
            Submission::External {
                sender,
                receiver,
                value,
                ..
            } => Transaction::new(sender.clone(), receiver.clone(), *value),
            Submission::Reward { receiver, value } => Transaction::reward(receiver.clone(), *value),
        }
    }

    /// Checks the submission and returns the record to admit
    pub fn verify(&self) -> Result<Transaction, TransactionError> {
        let transaction = self.transaction();

        if let Submission::External {
            sender,
            public_key,
            signature,
            ..
        } = self
        {
            if sender.0 == MINING_SENDER {
                return Err(TransactionError::ReservedSender(sender.0.clone()));
            }
            if !transaction.verify(signature, public_key) {
                return Err(TransactionError::InvalidSignature);
            }
        }

        Ok(transaction)
    }
}

/// Signed transaction as it travels between nodes
///
/// Every field is optional on the wire so a missing one can be reported
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    pub sender_address: Option<String>,
    pub receiver_address: Option<String>,
    /// X and Y coordinates as 128 hex characters
    pub sender_public_key: Option<String>,
    pub value: Option<f64>,
    /// r and s as 128 hex characters
    pub signature: Option<String>,
}

impl TransactionRequest {
    /// Builds the request for a signed transaction
    pub fn signed(transaction: &Transaction, public_key: &PublicKey, signature: &DigitalSignature) -> Self {
        TransactionRequest {
            sender_address: Some(transaction.sender_address.0.clone()),
            receiver_address: Some(transaction.receiver_address.0.clone()),
            sender_public_key: Some(public_key.to_hex()),
            value: Some(transaction.value),
            signature: Some(signature.to_hex()),
        }
    }

    /// Checks that every field is present and parses key material
    pub fn validate(&self) -> Result<Submission, TransactionError> {
        let sender = required(&self.sender_address, "sender_address")?;
        let receiver = required(&self.receiver_address, "receiver_address")?;
        let public_key = required(&self.sender_public_key, "sender_public_key")?;
        let value = self
            .value
            .ok_or_else(|| TransactionError::MalformedRequest("value is missing".to_string()))?;
        let signature = required(&self.signature, "signature")?;

        if !value.is_finite() || value < 0.0 {
            return Err(TransactionError::MalformedRequest(format!("invalid value {}", value)));
        }

        Ok(Submission::External {
            sender: Address(sender.clone()),
            receiver: Address(receiver.clone()),
            value,
            public_key: PublicKey::from_hex(public_key)?,
            signature: DigitalSignature::from_hex(signature)?,
        })
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a String, TransactionError> {
    field
        .as_ref()
        .ok_or_else(|| TransactionError::MalformedRequest(format!("{} is missing", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_submission(sender: &Wallet, receiver: &Address, value: f64) -> Submission {
        let transaction = Transaction::new(sender.address().clone(), receiver.clone(), value);
        Submission::External {
            sender: sender.address().clone(),
            receiver: receiver.clone(),
            value,
            public_key: sender.public_key().clone(),
            signature: transaction.sign(sender).unwrap(),
        }
    }

    #[test]
    fn test_canonical_encoding() {
        let transaction = Transaction::new(Address::from("A"), Address::from("B"), 1.5);
        let bytes = transaction.to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"sender_address":"A","receiver_address":"B","value":1.5}"#
        );
    }

    #[test]
    fn test_reward_transaction() {
        let transaction = Transaction::reward(Address::from("miner"), 1.0);
        assert_eq!(transaction.sender_address.0, MINING_SENDER);
        assert_eq!(transaction.receiver_address.0, "miner");
        assert_eq!(transaction.sender_address.0, MINING_SENDER);
    }

    #[test]
    fn test_signed_submission_verifies() {
        let sender = Wallet::new().unwrap();
        let receiver = Wallet::new().unwrap();
        let submission = signed_submission(&sender, receiver.address(), 1.234567891012345678);

        let transaction = submission.verify().unwrap();
        assert_eq!(transaction.sender_address, *sender.address());
        assert_eq!(transaction.value, 1.234567891012345678);
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let sender = Wallet::new().unwrap();
        let receiver = Wallet::new().unwrap();
        let submission = match signed_submission(&sender, receiver.address(), 10.0) {
            Submission::External {
                sender,
                receiver,
                public_key,
                signature,
                ..
            } => Submission::External {
                sender,
                receiver,
                value: 11.0,
                public_key,
                signature,
            },
            other => other,
        };

        assert!(matches!(submission.verify(), Err(TransactionError::InvalidSignature)));
    }

    #[test]
    fn test_reordered_fields_do_not_verify() {
        let sender = Wallet::new().unwrap();
        let transaction = Transaction::new(sender.address().clone(), Address::from("B"), 2.0);
        let reordered = serde_json::json!({
            "value": 2.0,
            "sender_address": sender.address().0,
            "receiver_address": "B",
        });
        let signature = sender.sign(&serde_json::to_vec(&reordered).unwrap()).unwrap();

        assert!(!transaction.verify(&signature, sender.public_key()));
    }

    #[test]
    fn test_external_cannot_claim_reserved_sender() {
        let wallet = Wallet::new().unwrap();
        let transaction = Transaction::reward(Address::from("B"), 1.0);
        let submission = Submission::External {
            sender: Address::from(MINING_SENDER),
            receiver: Address::from("B"),
            value: 1.0,
            public_key: wallet.public_key().clone(),
            signature: transaction.sign(&wallet).unwrap(),
        };

        assert!(matches!(submission.verify(), Err(TransactionError::ReservedSender(_))));
    }

    #[test]
    fn test_reward_submission_skips_verification() {
        let submission = Submission::Reward {
            receiver: Address::from("A"),
            value: 1.0,
        };
        assert_eq!(submission.verify().unwrap().sender_address.0, MINING_SENDER);
    }

    #[test]
    fn test_request_round_trip_through_validate() {
        let sender = Wallet::new().unwrap();
        let transaction = Transaction::new(sender.address().clone(), Address::from("B"), 3.0);
        let signature = transaction.sign(&sender).unwrap();

        let request = TransactionRequest::signed(&transaction, sender.public_key(), &signature);
        let verified = request.validate().unwrap().verify().unwrap();
        assert_eq!(verified, transaction);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let sender = Wallet::new().unwrap();
        let transaction = Transaction::new(sender.address().clone(), Address::from("B"), 3.0);
        let signature = transaction.sign(&sender).unwrap();

        let mut request = TransactionRequest::signed(&transaction, sender.public_key(), &signature);
        request.signature = None;
        match request.validate() {
            Err(TransactionError::MalformedRequest(msg)) => assert!(msg.contains("signature")),
            other => panic!("expected malformed request, got {:?}", other),
        }

        let empty: TransactionRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(empty.validate(), Err(TransactionError::MalformedRequest(_))));
    }

    #[test]
    fn test_bad_public_key_is_rejected() {
        let request = TransactionRequest {
            sender_address: Some("A".to_string()),
            receiver_address: Some("B".to_string()),
            sender_public_key: Some("not-hex".to_string()),
            value: Some(1.0),
            signature: Some("00".repeat(64)),
        };
        assert!(matches!(
            request.validate(),
            Err(TransactionError::CryptoError(CryptoError::InvalidPublicKey(_)))
        ));
    }
}
