/// Transaction types for powledger
use crate::blockchain::Sha256Hash;
use crate::crypto::Address;
use sha2::{Digest, Sha256};

/// Value moved by a transaction.
pub type Amount = i64;

/// An intent to move `amount` from `from` to `to`.
///
/// A transaction without a sender is a mining reward and carries no signature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub from: Option<Address>,
    pub to: Address,
    pub amount: Amount,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(from: Address, to: Address, amount: Amount) -> Self {
        Self::new_at(Some(from), to, amount, chrono::Utc::now().timestamp_millis() as u64)
    }

    /// Builds a transaction with an explicit timestamp.
    pub fn new_at(from: Option<Address>, to: Address, amount: Amount, timestamp: u64) -> Self {
        Transaction {
            from,
            to,
            amount,
            timestamp,
            signature: None,
        }
    }

    /// Reward credited to a miner; never signed.
    pub fn reward(to: Address, amount: Amount) -> Self {
        Self::new_at(None, to, amount, chrono::Utc::now().timestamp_millis() as u64)
    }

    pub fn is_reward(&self) -> bool {
        self.from.is_none()
    }

    /// SHA-256 of `(from, to, amount, timestamp)`. The signature is not covered.
    pub fn content_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        match &self.from {
            Some(from) => {
                hasher.update([1u8]);
                hasher.update((from.as_str().len() as u64).to_le_bytes());
                hasher.update(from.as_str().as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update((self.to.as_str().len() as u64).to_le_bytes());
        hasher.update(self.to.as_str().as_bytes());
        hasher.update(self.amount.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.content_hash())
    }

    /// Whether `address` sent or received this transaction.
    pub fn involves(&self, address: &Address) -> bool {
        self.from.as_ref() == Some(address) || &self.to == address
    }
}
