//! SHA-256 Merkle root over transaction ids, with odd-level duplication.
//!
//! Grounded on the teacher's `blockchain::merkle` tree shape (iterative
//! pairwise reduction, last-node duplication) but over hex transaction ids
//! rather than raw 64-byte leaves, and SHA-256 rather than SHA-512.

use crate::crypto::sha256_hex;

/// Compute the Merkle root of the given transaction ids (hex strings).
/// An empty input yields `sha256("")`.
pub fn merkle_root(tx_ids: &[String]) -> String {
    if tx_ids.is_empty() {
        return sha256_hex(b"");
    }

    let mut level: Vec<String> = tx_ids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            let last = level.last().unwrap().clone();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            let combined = format!("{}{}", pair[0], pair[1]);
            next.push(sha256_hex(combined.as_bytes()));
        }
        level = next;
    }
    level.into_iter().next().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256_hex;

    #[test]
    fn empty_transactions_hash_empty_string() {
        assert_eq!(merkle_root(&[]), sha256_hex(b""));
    }

    #[test]
    fn single_leaf_is_returned_unchanged() {
        let ids = vec!["abc".to_string()];
        assert_eq!(merkle_root(&ids), "abc");
    }

    #[test]
    fn two_leaves_combine_directly() {
        let ids = vec!["aa".to_string(), "bb".to_string()];
        let expected = sha256_hex(b"aabb");
        assert_eq!(merkle_root(&ids), expected);
    }

    #[test]
    fn odd_count_duplicates_last() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ab = sha256_hex(b"ab");
        let cc = sha256_hex(b"cc");
        let expected = sha256_hex(format!("{ab}{cc}").as_bytes());
        assert_eq!(merkle_root(&ids), expected);
    }
}
