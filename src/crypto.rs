//! Cryptographic primitives for powledger

use crate::blockchain::Sha256Hash;
use crate::error::ChainError;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{SECRET_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use std::fmt;

/// Account identifier: lowercase hex of an uncompressed secp256k1 public key.
///
/// Recipients are not required to be decodable keys; only a sender's address has
/// to resolve to a public key for its signature to verify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Address(value.into())
    }

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Address(hex::encode(public_key.serialize_uncompressed()))
    }

    /// Decodes the address back into the public key it encodes.
    pub fn public_key(&self) -> Result<PublicKey, ChainError> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex address: {}", e)))?;
        if bytes.len() != UNCOMPRESSED_PUBLIC_KEY_SIZE {
            return Err(ChainError::CryptoError(format!(
                "Address must encode {} bytes, got {}",
                UNCOMPRESSED_PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        PublicKey::from_slice(&bytes)
            .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shortened form for log lines and tables.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 16 {
            return self.0.clone();
        }
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address(value)
    }
}

/// Signing capability handed to transactions explicitly.
pub trait SignatureScheme: Send + Sync {
    /// Address of the public key belonging to `secret_key`.
    fn derive_address(&self, secret_key: &SecretKey) -> Address;

    /// Signs a 32-byte digest, returning the DER-encoded signature.
    fn sign_digest(&self, digest: &Sha256Hash, secret_key: &SecretKey) -> Vec<u8>;

    /// Checks `signature` over `digest` against the key encoded by `address`.
    /// Undecodable keys or signatures simply fail to verify.
    fn verify_digest(&self, digest: &Sha256Hash, signature: &[u8], address: &Address) -> bool;
}

/// ECDSA over secp256k1.
#[derive(Debug, Clone)]
pub struct Secp256k1Scheme {
    secp: Secp256k1<All>,
}

impl Secp256k1Scheme {
    pub fn new() -> Self {
        Secp256k1Scheme {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for Secp256k1Scheme {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureScheme for Secp256k1Scheme {
    fn derive_address(&self, secret_key: &SecretKey) -> Address {
        Address::from_public_key(&PublicKey::from_secret_key(&self.secp, secret_key))
    }

    fn sign_digest(&self, digest: &Sha256Hash, secret_key: &SecretKey) -> Vec<u8> {
        let message = Message::from_digest(*digest);
        self.secp
            .sign_ecdsa(&message, secret_key)
            .serialize_der()
            .to_vec()
    }

    fn verify_digest(&self, digest: &Sha256Hash, signature: &[u8], address: &Address) -> bool {
        let public_key = match address.public_key() {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("sender address {} is not a public key: {}", address.short(), e);
                return false;
            }
        };
        let signature = match Signature::from_der(signature) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::debug!("undecodable signature: {}", e);
                return false;
            }
        };
        let message = Message::from_digest(*digest);
        self.secp
            .verify_ecdsa(&message, &signature, &public_key)
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate(scheme: &Secp256k1Scheme) -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(scheme, secret_key)
    }

    pub fn from_secret_key(scheme: &Secp256k1Scheme, secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&scheme.secp, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(scheme: &Secp256k1Scheme, bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(scheme, secret_key))
    }

    pub fn from_secret_hex(scheme: &Secp256k1Scheme, secret_hex: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(scheme, &bytes)
    }

    /// The wallet address, which is the hex-encoded public key.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}
