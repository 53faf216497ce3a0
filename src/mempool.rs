//! The set of pending, not-yet-mined transactions, with de-dup and
//! double-spend-vs-pending admission checks.

use std::collections::HashSet;

use crate::chain::engine::is_mintable_sender;
use crate::chain::{Chain, Transaction};
use crate::error::MempoolError;

#[derive(Debug, Default)]
pub struct Mempool {
    /// Insertion order is preserved: transactions are selected for mining
    /// in the order they arrived.
    transactions: Vec<Transaction>,
    ids: HashSet<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Iterate pending transactions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Admit `tx` against `chain`'s current ledger per §3/§4.5: intrinsic
    /// validity, not already present, and sender balance covers this
    /// transaction plus everything already pending from the same sender.
    pub fn admit(&mut self, tx: Transaction, chain: &Chain) -> Result<(), MempoolError> {
        tx.validate_intrinsic()
            .map_err(|e| MempoolError::IntrinsicallyInvalid(e.to_string()))?;

        if self.ids.contains(&tx.id) {
            return Err(MempoolError::Duplicate(tx.id));
        }

        if !is_mintable_sender(&tx.sender) {
            let pending_spend: u64 = self
                .transactions
                .iter()
                .filter(|t| t.sender == tx.sender)
                .map(|t| t.amount + t.fee)
                .sum::<u64>()
                + tx.amount
                + tx.fee;
            let available = chain.balance(&tx.sender);
            if available < pending_spend as i64 {
                return Err(MempoolError::InsufficientBalance {
                    sender: tx.sender.clone(),
                    needed: pending_spend as i64,
                    available,
                });
            }
        }

        self.ids.insert(tx.id.clone());
        self.transactions.push(tx);
        Ok(())
    }

    /// Remove a transaction by id (used once it's been included in an
    /// accepted block).
    pub fn remove(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.transactions.retain(|t| t.id != id);
        }
    }

    /// Up to `max` pending transactions, in insertion order, for inclusion
    /// in a candidate block.
    pub fn select(&self, max: usize) -> Vec<Transaction> {
        self.transactions.iter().take(max).cloned().collect()
    }

    /// Re-evaluate every pending transaction against `chain`'s current
    /// ledger, dropping any that are no longer fundable. Used after a chain
    /// replacement.
    pub fn reevaluate(&mut self, chain: &Chain) {
        let previous = std::mem::take(&mut self.transactions);
        self.ids.clear();
        for tx in previous {
            let _ = self.admit(tx, chain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RewardSchedule;

    fn chain_with_balance(address: &str, amount: i64) -> Chain {
        let mut chain = Chain::new_genesis(RewardSchedule::new(50, 210_000));
        if amount > 0 {
            let tip = chain.tip().clone();
            let coinbase = Transaction::new_coinbase(address, amount as u64, tip.timestamp + 1);
            let block = crate::chain::Block::candidate(
                tip.height + 1,
                tip.timestamp + 1,
                vec![coinbase],
                tip.hash.clone(),
                0,
                address.to_string(),
                amount as u64,
            );
            chain.append_block(block).unwrap();
        }
        chain
    }

    #[test]
    fn duplicate_tx_is_rejected() {
        let chain = chain_with_balance("M", 100);
        let mut mempool = Mempool::new();
        let tx = Transaction::new("M", "R", 10, 1, 2000);
        mempool.admit(tx.clone(), &chain).unwrap();
        let err = mempool.admit(tx, &chain).unwrap_err();
        assert!(matches!(err, MempoolError::Duplicate(_)));
    }

    #[test]
    fn double_spend_against_pending_is_rejected_scenario_4() {
        let chain = chain_with_balance("M", 50);
        let mut mempool = Mempool::new();
        let t1 = Transaction::new("M", "A", 30, 1, 2000);
        mempool.admit(t1, &chain).unwrap();

        let t2 = Transaction::new("M", "B", 25, 1, 2001);
        let err = mempool.admit(t2, &chain).unwrap_err();
        assert!(matches!(err, MempoolError::InsufficientBalance { .. }));
    }

    #[test]
    fn select_respects_insertion_order_and_bound() {
        let chain = chain_with_balance("M", 1000);
        let mut mempool = Mempool::new();
        for i in 0..15 {
            let tx = Transaction::new("M", format!("R{i}"), 1, 0, 2000 + i);
            mempool.admit(tx, &chain).unwrap();
        }
        let selected = mempool.select(10);
        assert_eq!(selected.len(), 10);
        assert_eq!(selected[0].receiver, "R0");
    }
}
