use p256::ecdsa::signature::{RandomizedSigner, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

/// Version byte prefixed to the public key digest before checksumming
pub const ADDRESS_VERSION: u8 = 0x00;

/// Number of checksum bytes appended to an address payload
const CHECKSUM_LEN: usize = 4;

/// Length in bytes of one affine coordinate on P-256
const COORDINATE_LEN: usize = 32;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to sign message: {0}")]
    SigningError(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents a wallet address (base58 of version byte, key digest and checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Derives the address of a public key
    ///
    /// The coordinates are hashed as minimal big-endian integers, so a
    /// coordinate with leading zero bytes contributes fewer than 32 bytes.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = Sha256::new()
            .chain_update(trim_leading_zeros(public_key.x()))
            .chain_update(trim_leading_zeros(public_key.y()))
            .finalize();
        let digest = Sha256::digest(digest);

        let mut payload = Vec::with_capacity(1 + digest.len() + CHECKSUM_LEN);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&digest);

        let checksum = Sha256::digest(Sha256::digest(&payload));
        payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);

        Address(bs58::encode(payload).into_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// An uncompressed P-256 public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
    /// X || Y, each coordinate left-padded to 32 bytes
    coordinates: [u8; 2 * COORDINATE_LEN],
}

impl PublicKey {
    /// Wraps a verifying key, capturing its affine coordinates
    pub fn from_verifying_key(key: VerifyingKey) -> Result<Self, CryptoError> {
        let point = key.to_encoded_point(false);
        // SEC1 uncompressed form is 0x04 || X || Y
        let coordinates = point
            .as_bytes()
            .get(1..)
            .and_then(|xy| <[u8; 2 * COORDINATE_LEN]>::try_from(xy).ok())
            .ok_or_else(|| CryptoError::InvalidPublicKey("point at infinity".to_string()))?;

        Ok(PublicKey { key, coordinates })
    }

    /// Parses the 128-character hex form (X then Y, 64 hex digits each)
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let coordinates = <[u8; 2 * COORDINATE_LEN]>::from_hex_str(s)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        let mut sec1 = [0u8; 1 + 2 * COORDINATE_LEN];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&coordinates);

        let key = VerifyingKey::from_sec1_bytes(&sec1)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        Ok(PublicKey { key, coordinates })
    }

    /// Renders X and Y as two zero-padded 64-digit hex numbers
    pub fn to_hex(&self) -> String {
        hex::encode(self.coordinates)
    }

    /// The big-endian X coordinate
    pub fn x(&self) -> &[u8] {
        &self.coordinates[..COORDINATE_LEN]
    }

    /// The big-endian Y coordinate
    pub fn y(&self) -> &[u8] {
        &self.coordinates[COORDINATE_LEN..]
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_hex(s)
    }
}

/// An ECDSA signature held as its (r, s) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalSignature(Signature);

impl DigitalSignature {
    /// Parses the 128-character hex form (r then s, 64 hex digits each)
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = <[u8; 64]>::from_hex_str(s)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

        Signature::from_slice(&bytes)
            .map(DigitalSignature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    /// Renders r and s as two zero-padded 64-digit hex numbers
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl fmt::Display for DigitalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DigitalSignature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DigitalSignature::from_hex(s)
    }
}

/// Fixed-width hex decoding shared by keys and signatures
trait FromHexStr: Sized {
    fn from_hex_str(s: &str) -> Result<Self, CryptoError>;
}

impl<const N: usize> FromHexStr for [u8; N] {
    fn from_hex_str(s: &str) -> Result<Self, CryptoError> {
        if s.len() != 2 * N {
            return Err(CryptoError::DecodingError(format!(
                "expected {} hex characters, got {}",
                2 * N,
                s.len()
            )));
        }

        let mut out = [0u8; N];
        hex::decode_to_slice(s, &mut out).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        Ok(out)
    }
}

/// Represents a wallet with a P-256 keypair
///
/// Key material lives only in process memory; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Result<Self, CryptoError> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Creates a wallet from a hex-encoded private scalar
    ///
    /// Shorter inputs are treated as big-endian integers and left-padded.
    pub fn from_private_key_hex(private_key: &str) -> Result<Self, CryptoError> {
        if private_key.len() > 2 * COORDINATE_LEN {
            return Err(CryptoError::InvalidPrivateKey("private key too long".to_string()));
        }

        let padded = format!("{:0>64}", private_key);
        let bytes = <[u8; COORDINATE_LEN]>::from_hex_str(&padded)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self, CryptoError> {
        let public_key = PublicKey::from_verifying_key(signing_key.verifying_key().clone())?;
        let address = Address::from_public_key(&public_key);

        Ok(Wallet {
            signing_key,
            public_key,
            address,
        })
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs the SHA-256 digest of a message with a randomized nonce
    pub fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError> {
        let signature: Signature = self
            .signing_key
            .try_sign_with_rng(&mut OsRng, message)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;

        Ok(DigitalSignature(signature))
    }

    /// Exports the private scalar as 64 hex characters
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

/// Verifies a signature against a message and public key
///
/// Any mismatch yields `false`; this never errors.
pub fn verify_signature(message: &[u8], signature: &DigitalSignature, public_key: &PublicKey) -> bool {
    public_key.verifying_key().verify(message, &signature.0).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_PRIVATE_KEY: &str =
        "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";

    fn has_valid_checksum(address: &Address) -> bool {
        let Ok(bytes) = bs58::decode(&address.0).into_vec() else {
            return false;
        };
        if bytes.len() <= CHECKSUM_LEN {
            return false;
        }

        let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let expected = Sha256::digest(Sha256::digest(payload));
        checksum == &expected[..CHECKSUM_LEN]
    }

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new().unwrap();
        assert!(!wallet.address().0.is_empty());
        assert_eq!(wallet.public_key().to_hex().len(), 128);
        assert_eq!(wallet.private_key_hex().len(), 64);
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::new().unwrap();
        let message = b"Hello, world!";

        let signature = wallet.sign(message).unwrap();
        assert!(verify_signature(message, &signature, wallet.public_key()));

        let wrong_message = b"Wrong message";
        assert!(!verify_signature(wrong_message, &signature, wallet.public_key()));

        let other = Wallet::new().unwrap();
        assert!(!verify_signature(message, &signature, other.public_key()));
    }

    #[test]
    fn test_address_is_deterministic_for_fixed_key() {
        let first = Wallet::from_private_key_hex(FIXTURE_PRIVATE_KEY).unwrap();
        let second = Wallet::from_private_key_hex(FIXTURE_PRIVATE_KEY).unwrap();
        assert_eq!(first.address(), second.address());

        // Re-deriving from the hex coordinates alone gives the same address
        let public_key = PublicKey::from_hex(&first.public_key().to_hex()).unwrap();
        assert_eq!(Address::from_public_key(&public_key), *first.address());
    }

    #[test]
    fn test_address_known_vector() {
        let wallet = Wallet::from_private_key_hex(FIXTURE_PRIVATE_KEY).unwrap();

        assert_eq!(
            wallet.public_key().to_hex(),
            "60fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6\
             7903fe1008b8bc99a41ae9e95628bc64f2f1b20c2d7e9f5177a3c294d4462299"
        );
        assert_eq!(wallet.address().0, "19mi4wH4YJLx63v6VYSWezQNG4NJYYQ5cqdcAfvjKhWgkQv9U2");
    }

    #[test]
    fn test_address_known_vector_with_leading_zero_coordinate() {
        // Y starts with a zero byte, which is dropped before hashing
        let wallet = Wallet::from_private_key_hex("2b").unwrap();

        assert_eq!(
            wallet.public_key().to_hex(),
            "986ae2506f1ff104d04230861d8f4b498f4bc4c6d009b30f7544dc129b82d28d\
             003cccc0a6460e0ae328a4d97d3c7b61d86fc6289c189f2525110c441bb07e97"
        );
        assert_eq!(wallet.public_key().y()[0], 0);
        assert_eq!(wallet.address().0, "1nC3f4zkYFKTRnZeTQxJJZg8LqWZuGKJGkA9yPfgJGmJtxVgtp");
    }

    #[test]
    fn test_address_layout() {
        let wallet = Wallet::from_private_key_hex(FIXTURE_PRIVATE_KEY).unwrap();
        let bytes = bs58::decode(&wallet.address().0).into_vec().unwrap();

        assert_eq!(bytes.len(), 37);
        assert_eq!(bytes[0], ADDRESS_VERSION);
        assert!(has_valid_checksum(wallet.address()));

        let digest = Sha256::digest(Sha256::digest(
            [
                trim_leading_zeros(wallet.public_key().x()),
                trim_leading_zeros(wallet.public_key().y()),
            ]
            .concat(),
        ));
        assert_eq!(&bytes[1..33], &digest[..]);
    }

    #[test]
    fn test_corrupted_address_fails_checksum() {
        let wallet = Wallet::new().unwrap();
        let mut bytes = bs58::decode(&wallet.address().0).into_vec().unwrap();
        bytes[5] ^= 0xff;
        let corrupted = Address(bs58::encode(bytes).into_string());
        assert!(!has_valid_checksum(&corrupted));
    }

    #[test]
    fn test_distinct_keys_have_distinct_addresses() {
        let a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_trim_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), &[1, 0]);
        assert_eq!(trim_leading_zeros(&[0, 0]), &[] as &[u8]);
        assert_eq!(trim_leading_zeros(&[7]), &[7]);
    }

    #[test]
    fn test_private_key_round_trip() {
        let wallet = Wallet::new().unwrap();
        let restored = Wallet::from_private_key_hex(&wallet.private_key_hex()).unwrap();
        assert_eq!(restored.public_key(), wallet.public_key());
        assert_eq!(restored.address(), wallet.address());
    }

    #[test]
    fn test_short_private_key_is_left_padded() {
        let padded = Wallet::from_private_key_hex(&format!("{:0>64}", "1f")).unwrap();
        let short = Wallet::from_private_key_hex("1f").unwrap();
        assert_eq!(short.address(), padded.address());
    }

    #[test]
    fn test_malformed_inputs_are_rejected() {
        assert!(PublicKey::from_hex("abcd").is_err());
        assert!(PublicKey::from_hex(&"zz".repeat(64)).is_err());
        // Well-formed hex but not a point on the curve
        assert!(PublicKey::from_hex(&"01".repeat(64)).is_err());
        assert!(DigitalSignature::from_hex(&"00".repeat(10)).is_err());
        assert!(Wallet::from_private_key_hex(&"0".repeat(64)).is_err());
        assert!(Wallet::from_private_key_hex("xyz").is_err());
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let wallet = Wallet::new().unwrap();
        let signature = wallet.sign(b"payload").unwrap();
        let hex = signature.to_hex();
        assert_eq!(hex.len(), 128);

        let parsed: DigitalSignature = hex.parse().unwrap();
        assert!(verify_signature(b"payload", &parsed, wallet.public_key()));
    }
}
