/// Signing and signature checks, separated from the type definitions
use crate::crypto::SignatureScheme;
use crate::error::ChainError;
use crate::transaction::types::Transaction;
use secp256k1::SecretKey;

impl Transaction {
    /// Signs the content hash with `secret_key`, which must belong to `from`.
    ///
    /// Callers sign a transaction once; signing again replaces the signature.
    pub fn sign(&mut self, scheme: &dyn SignatureScheme, secret_key: &SecretKey) -> Result<(), ChainError> {
        let signer = scheme.derive_address(secret_key);
        match &self.from {
            Some(from) if *from == signer => {}
            Some(from) => {
                return Err(ChainError::AuthorizationError(format!(
                    "key for {} cannot sign a transaction from {}",
                    signer.short(),
                    from.short()
                )))
            }
            None => {
                return Err(ChainError::AuthorizationError(
                    "reward transactions are not signed".to_string(),
                ))
            }
        }

        let digest = self.content_hash();
        self.signature = Some(scheme.sign_digest(&digest, secret_key));
        Ok(())
    }

    /// Checks the signature against `from` as the public key.
    ///
    /// Reward transactions are always valid. A non-reward transaction with no
    /// (or an empty) signature is an error rather than `false`.
    pub fn verify(&self, scheme: &dyn SignatureScheme) -> Result<bool, ChainError> {
        let from = match &self.from {
            None => return Ok(true),
            Some(from) => from,
        };

        let signature = match &self.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(ChainError::MissingSignature),
        };

        Ok(scheme.verify_digest(&self.content_hash(), signature, from))
    }
}
