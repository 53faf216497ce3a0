use crate::crypto::sha256_hex;
use crate::error::ChainError;
use serde::{Deserialize, Serialize};

/// Sentinel sender marking a minting (coinbase) transaction.
pub const COINBASE_SENDER: &str = "COINBASE";
/// Sentinel sender used only in the genesis block.
pub const GENESIS_SENDER: &str = "Genesis";
/// Address holding the genesis supply allocation.
pub const FOUNDATION_RESERVE: &str = "GSC_FOUNDATION_RESERVE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    pub fee: u64,
    pub timestamp: i64,
    pub signature: Option<String>,
    pub id: String,
}

impl Transaction {
    /// Construct a transaction, computing its id from the canonical field
    /// concatenation.
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: u64, fee: u64, timestamp: i64) -> Self {
        let sender = sender.into();
        let receiver = receiver.into();
        let id = Self::compute_id(&sender, &receiver, amount, fee, timestamp);
        Self {
            sender,
            receiver,
            amount,
            fee,
            timestamp,
            signature: None,
            id,
        }
    }

    pub fn new_coinbase(receiver: impl Into<String>, amount: u64, timestamp: i64) -> Self {
        Self::new(COINBASE_SENDER, receiver, amount, 0, timestamp)
    }

    pub fn new_genesis(receiver: impl Into<String>, amount: u64, timestamp: i64) -> Self {
        Self::new(GENESIS_SENDER, receiver, amount, 0, timestamp)
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender == COINBASE_SENDER
    }

    pub fn is_genesis(&self) -> bool {
        self.sender == GENESIS_SENDER
    }

    fn compute_id(sender: &str, receiver: &str, amount: u64, fee: u64, timestamp: i64) -> String {
        let canonical = format!("{sender}{receiver}{amount}{fee}{timestamp}");
        sha256_hex(canonical.as_bytes())
    }

    /// Recompute the id from this transaction's own fields.
    pub fn recompute_id(&self) -> String {
        Self::compute_id(&self.sender, &self.receiver, self.amount, self.fee, self.timestamp)
    }

    /// Intrinsic validity: amount positive, sender != receiver unless
    /// coinbase/genesis, and the id matches the recomputed hash.
    pub fn validate_intrinsic(&self) -> Result<(), ChainError> {
        if self.amount == 0 {
            return Err(ChainError::IntrinsicallyInvalid(format!(
                "transaction {} has non-positive amount",
                self.id
            )));
        }
        if self.sender == self.receiver && !self.is_coinbase() && !self.is_genesis() {
            return Err(ChainError::IntrinsicallyInvalid(format!(
                "transaction {} has identical sender and receiver",
                self.id
            )));
        }
        if self.id != self.recompute_id() {
            return Err(ChainError::IntrinsicallyInvalid(format!(
                "transaction {} id does not match recomputed hash",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = Transaction::new("alice", "bob", 10, 1, 1000);
        let b = Transaction::new("alice", "bob", 10, 1, 1000);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn self_send_rejected_for_ordinary_sender() {
        let tx = Transaction::new("alice", "alice", 10, 0, 1000);
        assert!(tx.validate_intrinsic().is_err());
    }

    #[test]
    fn coinbase_may_share_receiver_with_sentinel_sender() {
        let tx = Transaction::new_coinbase("COINBASE", 10, 1000);
        // sender == receiver here but sender is the coinbase sentinel, so it's allowed.
        assert!(tx.validate_intrinsic().is_ok());
    }

    #[test]
    fn zero_amount_rejected() {
        let tx = Transaction::new("alice", "bob", 0, 0, 1000);
        assert!(tx.validate_intrinsic().is_err());
    }

    #[test]
    fn tampered_id_rejected() {
        let mut tx = Transaction::new("alice", "bob", 10, 1, 1000);
        tx.id = "deadbeef".to_string();
        assert!(tx.validate_intrinsic().is_err());
    }
}
