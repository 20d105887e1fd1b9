use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::{Address, Block, Transaction, TransactionError, Wallet};

/// Response for the chain endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chains: Vec<Block>,

    /// The length of the chain
    pub length: usize,

    /// Whether every block links to its predecessor's hash
    pub is_valid: bool,
}

/// Response for the transaction pool endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PoolResponse {
    pub transactions: Vec<Transaction>,
    pub length: usize,
}

/// Outcome of a command, `success` or `fail`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub message: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        StatusResponse {
            message: "success".to_string(),
        }
    }

    pub fn fail() -> Self {
        StatusResponse {
            message: "fail".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AmountQuery {
    /// Address whose balance is computed
    pub blockchain_address: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AmountResponse {
    pub amount: f64,
}

/// Freshly generated wallet; the private key is not kept by the node
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// Private scalar, 64 hex characters
    pub private_key: String,

    /// X and Y coordinates, 128 hex characters
    pub public_key: String,

    pub blockchain_address: String,
}

impl From<&Wallet> for WalletResponse {
    fn from(wallet: &Wallet) -> Self {
        WalletResponse {
            private_key: wallet.private_key_hex(),
            public_key: wallet.public_key().to_hex(),
            blockchain_address: wallet.address().0.clone(),
        }
    }
}

/// Request to sign a transfer with the supplied keys and submit it
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WalletTransactionRequest {
    pub sender_private_key: Option<String>,
    pub sender_blockchain_address: Option<String>,
    pub receiver_blockchain_address: Option<String>,
    pub sender_public_key: Option<String>,
    /// Decimal amount as a string
    pub value: Option<String>,
}

impl WalletTransactionRequest {
    /// Checks the fields and returns the signing wallet and the unsigned transfer
    pub fn validate(&self) -> Result<(Wallet, Transaction), TransactionError> {
        let private_key = required(&self.sender_private_key, "Sender private key")?;
        let sender = required(&self.sender_blockchain_address, "Sender blockchain address")?;
        let receiver = required(&self.receiver_blockchain_address, "Receiver blockchain address")?;
        let public_key = required(&self.sender_public_key, "Sender public key")?;
        let value = required(&self.value, "Transaction value")?;

        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| TransactionError::MalformedRequest(format!("Transaction value {} is not a number", value)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(TransactionError::MalformedRequest(format!("invalid value {}", value)));
        }

        let wallet = Wallet::from_private_key_hex(private_key)?;
        if !wallet.public_key().to_hex().eq_ignore_ascii_case(public_key) {
            return Err(TransactionError::MalformedRequest(
                "Private key does not match public key".to_string(),
            ));
        }

        let transaction = Transaction::new(Address(sender.clone()), Address(receiver.clone()), value);
        Ok((wallet, transaction))
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a String, TransactionError> {
    field
        .as_ref()
        .ok_or_else(|| TransactionError::MalformedRequest(format!("{} is missing", name)))
}
