//! Error types for powledger

use std::fmt;

use crate::transaction::Amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The signing key does not belong to the transaction's sender.
    AuthorizationError(String),
    MissingSignature,
    MalformedTransaction(String),
    InvalidSignature,
    NonPositiveAmount(Amount),
    InsufficientBalance {
        address: String,
        balance: i128,
        amount: Amount,
    },
    InvalidGenesis,
    InvalidBlockLinkage,
    InvalidBlock(String),
    MiningCancelled,
    MiningInProgress,
    WorkerPanicked,
    CryptoError(String),
    ConfigError(String),
    IoError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::AuthorizationError(msg) => write!(f, "Authorization error: {}", msg),
            ChainError::MissingSignature => write!(f, "No signature in this transaction"),
            ChainError::MalformedTransaction(msg) => write!(f, "Malformed transaction: {}", msg),
            ChainError::InvalidSignature => write!(f, "Cannot add invalid transaction to chain"),
            ChainError::NonPositiveAmount(amount) => {
                write!(f, "Transaction amount should be greater than 0, got {}", amount)
            }
            ChainError::InsufficientBalance {
                address,
                balance,
                amount,
            } => write!(
                f,
                "Insufficient balance for {}: has {}, needs {}",
                address, balance, amount
            ),
            ChainError::InvalidGenesis => write!(f, "Genesis block does not match the canonical genesis"),
            ChainError::InvalidBlockLinkage => write!(f, "Invalid block linkage"),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::MiningCancelled => write!(f, "Mining was cancelled"),
            ChainError::MiningInProgress => write!(f, "A mining job is already running"),
            ChainError::WorkerPanicked => write!(f, "Mining worker panicked"),
            ChainError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
