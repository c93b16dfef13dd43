use crate::crypto::Address;
use crate::transaction::Transaction;
use std::collections::HashMap;

use super::chain::Block;

/// Account balance; negative when an address has sent more than it received.
pub type Balance = i128;

/// Per-address balances maintained block by block.
///
/// Always agrees with [`replay_balance`] over the same blocks.
#[derive(Debug, Clone, Default)]
pub struct BalanceIndex {
    pub address_balances: HashMap<Address, Balance>,
}

impl BalanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, address: &Address) -> Balance {
        self.address_balances.get(address).copied().unwrap_or(0)
    }

    pub fn apply_transaction(&mut self, tx: &Transaction) {
        if let Some(from) = &tx.from {
            *self.address_balances.entry(from.clone()).or_insert(0) -= tx.amount as Balance;
        }
        *self.address_balances.entry(tx.to.clone()).or_insert(0) += tx.amount as Balance;
    }

    pub fn apply_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.apply_transaction(tx);
        }
    }
}

/// Replays every transaction in `blocks`: subtract what `address` sent, add what it received.
pub fn replay_balance<'a>(blocks: impl IntoIterator<Item = &'a Block>, address: &Address) -> Balance {
    let mut balance: Balance = 0;
    for block in blocks {
        for tx in &block.transactions {
            if tx.from.as_ref() == Some(address) {
                balance -= tx.amount as Balance;
            }
            if &tx.to == address {
                balance += tx.amount as Balance;
            }
        }
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, amount: i64) -> Transaction {
        Transaction::new_at(Some(Address::new(from)), Address::new(to), amount, 1)
    }

    fn history() -> Vec<Transaction> {
        vec![
            Transaction::new_at(None, Address::new("alice"), 100, 1),
            transfer("alice", "bob", 30),
            transfer("bob", "carol", 10),
            transfer("alice", "alice", 5),
            Transaction::new_at(None, Address::new("bob"), 100, 2),
        ]
    }

    #[test]
    fn test_balance_is_independent_of_block_partition() {
        let txs = history();
        let one_block = vec![Block::new(1, txs.clone(), [0u8; 32])];
        let split = vec![
            Block::new(1, txs[..2].to_vec(), [0u8; 32]),
            Block::new(2, Vec::new(), [1u8; 32]),
            Block::new(3, txs[2..].to_vec(), [2u8; 32]),
        ];
        let reversed = vec![
            Block::new(1, txs[3..].to_vec(), [0u8; 32]),
            Block::new(2, txs[..3].to_vec(), [1u8; 32]),
        ];

        for name in ["alice", "bob", "carol", "dave"] {
            let address = Address::new(name);
            let expected = replay_balance(&one_block, &address);
            assert_eq!(replay_balance(&split, &address), expected);
            assert_eq!(replay_balance(&reversed, &address), expected);
        }
        assert_eq!(replay_balance(&one_block, &Address::new("alice")), 70);
        assert_eq!(replay_balance(&one_block, &Address::new("bob")), 120);
        assert_eq!(replay_balance(&one_block, &Address::new("carol")), 10);
    }

    #[test]
    fn test_index_agrees_with_replay() {
        let blocks = vec![
            Block::new(1, history(), [0u8; 32]),
            Block::new(2, vec![transfer("carol", "dave", 50)], [1u8; 32]),
        ];

        let mut index = BalanceIndex::new();
        for block in &blocks {
            index.apply_block(block);
        }
        for name in ["alice", "bob", "carol", "dave", "erin"] {
            let address = Address::new(name);
            assert_eq!(index.get_balance(&address), replay_balance(&blocks, &address));
        }
        assert_eq!(index.get_balance(&Address::new("carol")), -40);
    }
}
