use crate::crypto::SignatureScheme;
use crate::error::ChainError;

use super::chain::{Block, Blockchain};

/// Walks the whole chain and reports the first broken block.
///
/// Block 0 must equal [`Block::genesis`]. Every later block must carry valid
/// transactions, a stored hash matching its content, and a `previous_hash`
/// equal to its predecessor's stored hash.
pub fn validate_chain(blocks: &[Block], scheme: &dyn SignatureScheme) -> Result<(), ChainError> {
    match blocks.first() {
        Some(first) if *first == Block::genesis() => {}
        _ => return Err(ChainError::InvalidGenesis),
    }

    for (index, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let height = index + 1;

        if !current.all_transactions_valid(scheme)? {
            return Err(ChainError::InvalidBlock(format!(
                "block {} contains a transaction with a bad signature",
                height
            )));
        }

        if !current.has_consistent_hash() {
            return Err(ChainError::InvalidBlock(format!(
                "block {} stored hash {} does not match its content",
                height,
                current.hash_str()
            )));
        }

        if current.previous_hash != previous.hash {
            return Err(ChainError::InvalidBlockLinkage);
        }
    }

    Ok(())
}

/// `Ok(true)` only if every block passes; a transaction without a
/// signature is surfaced as an error instead of `false`.
pub fn is_valid_chain(blocks: &[Block], scheme: &dyn SignatureScheme) -> Result<bool, ChainError> {
    match validate_chain(blocks, scheme) {
        Ok(()) => Ok(true),
        Err(ChainError::MissingSignature) => Err(ChainError::MissingSignature),
        Err(e) => {
            tracing::warn!("chain validation failed: {}", e);
            Ok(false)
        }
    }
}

impl Blockchain {
    pub fn validate_chain(&self) -> Result<(), ChainError> {
        validate_chain(self.blocks(), self.scheme())
    }

    pub fn is_valid(&self) -> Result<bool, ChainError> {
        is_valid_chain(self.blocks(), self.scheme())
    }
}
