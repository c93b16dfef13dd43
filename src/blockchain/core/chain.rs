use crate::config::LedgerConfig;
use crate::crypto::{Address, Secp256k1Scheme, SignatureScheme};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::meets_difficulty;
use crate::transaction::{Amount, Transaction};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::state::{Balance, BalanceIndex};

pub type Sha256Hash = [u8; 32];

/// 2021-02-01T00:00:00Z in milliseconds.
pub const GENESIS_TIMESTAMP: u64 = 1_612_137_600_000;
pub const GENESIS_PREVIOUS_HASH: Sha256Hash = [0u8; 32];

pub const DEFAULT_DIFFICULTY: u32 = 5;
pub const DEFAULT_MINING_REWARD: Amount = 100;
/// A SHA-256 digest has 64 hex digits; anything above can never be met.
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Sha256Hash,
    pub nonce: u64,
    /// Hash of the fields above as of the last mining step.
    pub hash: Sha256Hash,
}

impl Block {
    pub fn new(timestamp: u64, transactions: Vec<Transaction>, previous_hash: Sha256Hash) -> Self {
        let mut block = Block {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: [0u8; 32],
        };
        block.hash = block.compute_hash();
        block
    }

    /// The canonical first block. Every call yields an identical value.
    pub fn genesis() -> Self {
        Block::new(GENESIS_TIMESTAMP, Vec::new(), GENESIS_PREVIOUS_HASH)
    }

    pub fn compute_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            hasher.update(tx.content_hash());
            let signature = tx.signature.as_deref().unwrap_or_default();
            hasher.update((signature.len() as u64).to_le_bytes());
            hasher.update(signature);
        }
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }

    /// Whether the stored hash still matches the block's content.
    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    /// True iff every transaction verifies. A missing signature is propagated.
    pub fn all_transactions_valid(&self, scheme: &dyn SignatureScheme) -> Result<bool, ChainError> {
        for tx in &self.transactions {
            if !tx.verify(scheme)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// The ledger: mined blocks, the pending pool, and the rules tying them together.
#[derive(Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: u32,
    mining_reward: Amount,
    mempool: Mempool,
    state: BalanceIndex,
    scheme: Arc<dyn SignatureScheme>,
}

impl fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("height", &(self.blocks.len() - 1))
            .field("difficulty", &self.difficulty)
            .field("mining_reward", &self.mining_reward)
            .field("pending", &self.mempool.len())
            .finish()
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::build(DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, Arc::new(Secp256k1Scheme::new()))
    }
}

impl Blockchain {
    /// Create a new `Blockchain` holding only the genesis block.
    pub fn new(difficulty: u32, mining_reward: Amount) -> Result<Self, ChainError> {
        Self::with_scheme(difficulty, mining_reward, Arc::new(Secp256k1Scheme::new()))
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ChainError> {
        Self::new(config.difficulty, config.mining_reward)
    }

    /// Create a new `Blockchain` that checks signatures with the provided scheme.
    pub fn with_scheme(
        difficulty: u32,
        mining_reward: Amount,
        scheme: Arc<dyn SignatureScheme>,
    ) -> Result<Self, ChainError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "difficulty {} exceeds maximum {}",
                difficulty, MAX_DIFFICULTY
            )));
        }
        if mining_reward <= 0 {
            return Err(ChainError::ConfigError(format!(
                "mining reward must be positive, got {}",
                mining_reward
            )));
        }
        Ok(Self::build(difficulty, mining_reward, scheme))
    }

    fn build(difficulty: u32, mining_reward: Amount, scheme: Arc<dyn SignatureScheme>) -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            difficulty,
            mining_reward,
            mempool: Mempool::new(),
            state: BalanceIndex::new(),
            scheme,
        }
    }

    pub fn scheme(&self) -> &dyn SignatureScheme {
        self.scheme.as_ref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn latest_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn height(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn mining_reward(&self) -> Amount {
        self.mining_reward
    }

    /// Admits a signed transfer into the pending pool.
    ///
    /// The balance check only sees mined history, so several pending transfers
    /// from one sender can together exceed its balance.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        let from = match &tx.from {
            Some(from) if !from.is_empty() => from.clone(),
            _ => {
                return Err(ChainError::MalformedTransaction(
                    "Transaction must include from & to addresses".to_string(),
                ))
            }
        };
        if tx.to.is_empty() {
            return Err(ChainError::MalformedTransaction(
                "Transaction must include from & to addresses".to_string(),
            ));
        }

        if !tx.verify(self.scheme())? {
            tracing::warn!("rejected transaction {}: bad signature", tx.hash_str());
            return Err(ChainError::InvalidSignature);
        }

        if tx.amount <= 0 {
            return Err(ChainError::NonPositiveAmount(tx.amount));
        }

        if self.blocks.len() > 1 {
            let balance = self.balance_of(&from);
            if balance < tx.amount as Balance {
                tracing::warn!(
                    "rejected transaction {}: {} has {}, needs {}",
                    tx.hash_str(),
                    from.short(),
                    balance,
                    tx.amount
                );
                return Err(ChainError::InsufficientBalance {
                    address: from.to_string(),
                    balance,
                    amount: tx.amount,
                });
            }
        }

        tracing::debug!(
            "accepted transaction {} ({} -> {}, {})",
            tx.hash_str(),
            from.short(),
            tx.to.short(),
            tx.amount
        );
        self.mempool.add_transaction(tx);
        Ok(())
    }

    /// Packages the pending pool plus a reward into an unmined block on top of
    /// the current tip. The pool is left empty.
    pub fn prepare_candidate(&mut self, reward_address: &Address) -> Block {
        let mut transactions = self.mempool.drain();
        transactions.push(Transaction::reward(reward_address.clone(), self.mining_reward));

        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        Block::new(timestamp, transactions, self.latest_block().hash)
    }

    /// Returns a candidate's transfers to the front of the pool, dropping its reward.
    pub fn restore_pending(&mut self, candidate: Block) {
        let transfers: Vec<Transaction> = candidate
            .transactions
            .into_iter()
            .filter(|tx| !tx.is_reward())
            .collect();
        self.mempool.restore(transfers);
    }

    /// Appends a mined block that extends the current tip.
    pub fn commit_block(&mut self, block: Block) -> Result<&Block, ChainError> {
        if block.previous_hash != self.latest_block().hash {
            return Err(ChainError::InvalidBlockLinkage);
        }
        if !block.has_consistent_hash() {
            return Err(ChainError::InvalidBlock(format!(
                "stored hash {} does not match content",
                block.hash_str()
            )));
        }
        if !meets_difficulty(&block.hash, self.difficulty) {
            return Err(ChainError::InvalidBlock(format!(
                "hash {} does not meet difficulty {}",
                block.hash_str(),
                self.difficulty
            )));
        }

        self.state.apply_block(&block);
        self.blocks.push(block);
        Ok(self.latest_block())
    }

    /// Mines the pending pool plus a reward for `reward_address` and appends it.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> Result<&Block, ChainError> {
        let mut block = self.prepare_candidate(reward_address);
        tracing::info!(
            "mining block {} with {} transactions at difficulty {}",
            self.blocks.len(),
            block.transactions.len(),
            self.difficulty
        );

        let started = Instant::now();
        block.mine(self.difficulty);
        tracing::info!(
            "mined block {} (nonce {}, hash {}) in {:?}",
            self.blocks.len(),
            block.nonce,
            block.hash_str(),
            started.elapsed()
        );

        self.commit_block(block)
    }

    /// Net amount received minus amount sent by `address` across the chain.
    pub fn balance_of(&self, address: &Address) -> Balance {
        self.state.get_balance(address)
    }

    /// Every transaction sent or received by `address`, in chain order.
    /// Cloning the iterator restarts it.
    pub fn transactions_for<'a>(
        &'a self,
        address: &'a Address,
    ) -> impl Iterator<Item = &'a Transaction> + Clone + 'a {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(move |tx| tx.involves(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::replay_balance;
    use crate::crypto::KeyPair;

    fn funded_chain() -> (Blockchain, KeyPair) {
        let mut chain = Blockchain::new(1, 100).unwrap();
        let keypair = KeyPair::generate(&Secp256k1Scheme::new());
        chain.mine_pending_transactions(&keypair.address()).unwrap();
        (chain, keypair)
    }

    fn signed(chain: &Blockchain, keypair: &KeyPair, to: &str, amount: Amount) -> Transaction {
        let mut tx = Transaction::new(keypair.address(), Address::new(to), amount);
        tx.sign(chain.scheme(), &keypair.secret_key).unwrap();
        tx
    }

    #[test]
    fn test_genesis_is_canonical() {
        let chain = Blockchain::default();
        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.blocks()[0], Block::genesis());
        assert_eq!(chain.blocks()[0].previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(chain.blocks()[0].transactions.is_empty());
        assert_eq!(chain.difficulty(), DEFAULT_DIFFICULTY);
        assert_eq!(chain.mining_reward(), DEFAULT_MINING_REWARD);
    }

    #[test]
    fn test_rejects_unreachable_difficulty_and_bad_reward() {
        assert!(matches!(Blockchain::new(65, 100), Err(ChainError::ConfigError(_))));
        assert!(matches!(Blockchain::new(1, 0), Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_block_hash_covers_every_field() {
        let tx = Transaction::new_at(None, Address::new("miner"), 100, 5);
        let block = Block::new(10, vec![tx], [7u8; 32]);
        assert!(block.has_consistent_hash());

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.previous_hash = [8u8; 32];
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.transactions[0].amount = 101;
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.nonce = 1;
        assert_ne!(changed.compute_hash(), block.hash);
    }

    #[test]
    fn test_malformed_transaction_rejected() {
        let mut chain = Blockchain::new(1, 100).unwrap();
        let reward = Transaction::reward(Address::new("miner"), 100);
        assert!(matches!(
            chain.add_transaction(reward),
            Err(ChainError::MalformedTransaction(_))
        ));

        let keypair = KeyPair::generate(&Secp256k1Scheme::new());
        let tx = signed(&chain, &keypair, "", 10);
        assert!(matches!(
            chain.add_transaction(tx),
            Err(ChainError::MalformedTransaction(_))
        ));
        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn test_unsigned_transaction_rejected_as_missing_signature() {
        let mut chain = Blockchain::new(1, 100).unwrap();
        let keypair = KeyPair::generate(&Secp256k1Scheme::new());
        let tx = Transaction::new(keypair.address(), Address::new("bob"), 10);

        assert_eq!(chain.add_transaction(tx), Err(ChainError::MissingSignature));
    }

    #[test]
    fn test_tampered_transaction_rejected_as_invalid_signature() {
        let mut chain = Blockchain::new(1, 100).unwrap();
        let keypair = KeyPair::generate(&Secp256k1Scheme::new());
        let mut tx = signed(&chain, &keypair, "bob", 10);
        tx.amount = 20;

        assert_eq!(chain.add_transaction(tx), Err(ChainError::InvalidSignature));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut chain = Blockchain::new(1, 100).unwrap();
        let keypair = KeyPair::generate(&Secp256k1Scheme::new());
        let tx = signed(&chain, &keypair, "bob", -5);

        assert_eq!(chain.add_transaction(tx), Err(ChainError::NonPositiveAmount(-5)));
    }

    #[test]
    fn test_insufficient_balance_after_history_exists() {
        let (mut chain, keypair) = funded_chain();
        let tx = signed(&chain, &keypair, "bob", 101);

        let result = chain.add_transaction(tx);
        assert!(matches!(
            result,
            Err(ChainError::InsufficientBalance { balance: 100, amount: 101, .. })
        ));

        let tx = signed(&chain, &keypair, "bob", 100);
        assert!(chain.add_transaction(tx).is_ok());
        assert_eq!(chain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_pending_transfers_are_not_counted_against_balance() {
        let (mut chain, keypair) = funded_chain();
        for _ in 0..3 {
            let tx = signed(&chain, &keypair, "bob", 60);
            chain.add_transaction(tx).unwrap();
        }
        assert_eq!(chain.pending_transactions().len(), 3);
    }

    #[test]
    fn test_mining_links_blocks_and_clears_pool() {
        let (mut chain, keypair) = funded_chain();
        let tx = signed(&chain, &keypair, "bob", 40);
        chain.add_transaction(tx).unwrap();

        let first_hash = chain.latest_block().hash;
        let block = chain.mine_pending_transactions(&keypair.address()).unwrap();
        assert_eq!(block.previous_hash, first_hash);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions[1].is_reward());
        assert!(meets_difficulty(&block.hash, 1));

        assert!(chain.pending_transactions().is_empty());
        assert_eq!(chain.balance_of(&keypair.address()), 160);
        assert_eq!(chain.balance_of(&Address::new("bob")), 40);
    }

    #[test]
    fn test_commit_rejects_stale_or_unmined_candidates() {
        let mut chain = Blockchain::new(2, 100).unwrap();
        let miner = Address::new("miner");

        let stale = chain.prepare_candidate(&miner);
        chain.mine_pending_transactions(&miner).unwrap();
        let mut stale = stale;
        stale.mine(2);
        assert_eq!(chain.commit_block(stale), Err(ChainError::InvalidBlockLinkage));

        let mut unmined = chain.prepare_candidate(&miner);
        while meets_difficulty(&unmined.hash, 2) {
            unmined.nonce += 1;
            unmined.hash = unmined.compute_hash();
        }
        assert!(matches!(chain.commit_block(unmined), Err(ChainError::InvalidBlock(_))));
        assert_eq!(chain.blocks().len(), 2);
    }

    #[test]
    fn test_commit_rejects_block_edited_after_mining() {
        let mut chain = Blockchain::new(2, 100).unwrap();
        let mut block = chain.prepare_candidate(&Address::new("miner"));
        block.mine(2);
        block.timestamp += 1;

        match chain.commit_block(block) {
            Err(ChainError::InvalidBlock(reason)) => assert!(reason.contains("does not match content")),
            other => panic!("expected InvalidBlock, got {:?}", other),
        }
        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.balance_of(&Address::new("miner")), 0);
    }

    #[test]
    fn test_restore_pending_drops_reward() {
        let (mut chain, keypair) = funded_chain();
        let tx = signed(&chain, &keypair, "bob", 10);
        chain.add_transaction(tx.clone()).unwrap();

        let candidate = chain.prepare_candidate(&keypair.address());
        assert!(chain.pending_transactions().is_empty());

        chain.restore_pending(candidate);
        assert_eq!(chain.pending_transactions(), &[tx]);
    }

    #[test]
    fn test_balance_index_matches_replay() {
        let (mut chain, keypair) = funded_chain();
        for amount in [30, 20] {
            let tx = signed(&chain, &keypair, "bob", amount);
            chain.add_transaction(tx).unwrap();
        }
        chain.mine_pending_transactions(&Address::new("bob")).unwrap();

        for address in [keypair.address(), Address::new("bob"), Address::new("nobody")] {
            assert_eq!(chain.balance_of(&address), replay_balance(chain.blocks(), &address));
        }
        assert_eq!(chain.balance_of(&Address::new("bob")), 150);
    }

    #[test]
    fn test_transactions_for_is_restartable() {
        let (mut chain, keypair) = funded_chain();
        let tx = signed(&chain, &keypair, "bob", 10);
        chain.add_transaction(tx).unwrap();
        chain.mine_pending_transactions(&Address::new("other-miner")).unwrap();

        let bob = Address::new("bob");
        let history = chain.transactions_for(&bob);
        assert_eq!(history.clone().count(), 1);
        assert_eq!(history.count(), 1);

        let address = keypair.address();
        let amounts: Vec<Amount> = chain.transactions_for(&address).map(|tx| tx.amount).collect();
        assert_eq!(amounts, vec![100, 10]);
    }
}
