use super::merkle::merkle_root;
use super::transaction::Transaction;
use crate::crypto::{meets_difficulty, sha256_hex};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};

/// 64 hex-zero characters: the `previous_hash` of the genesis block.
pub fn zero_hash() -> String {
    "0".repeat(64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub miner: String,
    pub reward: u64,
    pub merkle_root: String,
    pub hash: String,
}

impl Block {
    /// Construct an unmined candidate block: merkle root computed, hash and
    /// nonce left at their zero/empty starting point for the miner to fill
    /// in via [`Self::with_nonce`].
    pub fn candidate(
        height: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        difficulty: u32,
        miner: String,
        reward: u64,
    ) -> Self {
        let merkle_root = merkle_root(&transactions.iter().map(|t| t.id.clone()).collect::<Vec<_>>());
        let mut block = Self {
            height,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            difficulty,
            miner,
            reward,
            merkle_root,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn compute_hash(&self) -> String {
        Self::hash_fields(
            self.height,
            self.timestamp,
            &self.previous_hash,
            &self.merkle_root,
            self.nonce,
            self.difficulty,
        )
    }

    pub fn hash_fields(
        height: u64,
        timestamp: i64,
        previous_hash: &str,
        merkle_root: &str,
        nonce: u64,
        difficulty: u32,
    ) -> String {
        let canonical = format!("{height}{timestamp}{previous_hash}{merkle_root}{nonce}{difficulty}");
        sha256_hex(canonical.as_bytes())
    }

    pub fn recompute_merkle_root(&self) -> String {
        merkle_root(&self.transactions.iter().map(|t| t.id.clone()).collect::<Vec<_>>())
    }

    /// Set `nonce`, recompute `hash`, and return the block. Used by the
    /// miner's search loop.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self.hash = self.compute_hash();
        self
    }

    /// Intrinsic validity per §4.1: hash matches recomputation, merkle root
    /// matches recomputation, hash meets the difficulty target, and every
    /// transaction is itself intrinsically valid.
    pub fn validate_intrinsic(&self) -> Result<(), ChainError> {
        if self.hash != self.compute_hash() {
            return Err(ChainError::IntrinsicallyInvalid(format!(
                "block {} hash does not match recomputed hash",
                self.height
            )));
        }
        if self.merkle_root != self.recompute_merkle_root() {
            return Err(ChainError::IntrinsicallyInvalid(format!(
                "block {} merkle root does not match recomputed root",
                self.height
            )));
        }
        if !meets_difficulty(&hex::decode(&self.hash).unwrap_or_default(), self.difficulty) {
            return Err(ChainError::IntrinsicallyInvalid(format!(
                "block {} hash does not meet difficulty {}",
                self.height, self.difficulty
            )));
        }
        for tx in &self.transactions {
            tx.validate_intrinsic()?;
        }
        Ok(())
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|t| t.is_coinbase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::transaction::Transaction;

    #[test]
    fn candidate_hash_is_reproducible() {
        let txs = vec![Transaction::new_coinbase("miner", 50, 1000)];
        let block = Block::candidate(1, 1000, txs, zero_hash(), 0, "miner".into(), 50);
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn tampered_hash_fails_intrinsic_validation() {
        let txs = vec![Transaction::new_coinbase("miner", 50, 1000)];
        let mut block = Block::candidate(1, 1000, txs, zero_hash(), 0, "miner".into(), 50);
        block.hash = "f".repeat(64);
        assert!(block.validate_intrinsic().is_err());
    }

    #[test]
    fn empty_transactions_block_hashes_empty_merkle_root() {
        let block = Block::candidate(1, 1000, vec![], zero_hash(), 0, "miner".into(), 0);
        assert_eq!(block.merkle_root, crate::crypto::sha256_hex(b""));
    }
}
