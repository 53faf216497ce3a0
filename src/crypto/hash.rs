use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// SHA-256(SHA-256(data)).
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Lowercase hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Number of leading hex-zero characters in `hash`'s hex representation.
pub fn leading_hex_zeros(hash: &[u8]) -> u32 {
    let hex = hex::encode(hash);
    hex.chars().take_while(|c| *c == '0').count() as u32
}

/// Whether `hash`'s hex representation has at least `difficulty` leading
/// zero characters.
pub fn meets_difficulty(hash: &[u8], difficulty: u32) -> bool {
    leading_hex_zeros(hash) >= difficulty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn double_sha256_is_sha256_twice() {
        let once = sha256(b"hello");
        let twice_manual = sha256(&once);
        assert_eq!(double_sha256(b"hello"), twice_manual);
    }

    #[test]
    fn difficulty_counts_leading_hex_zeros() {
        let hash = hex::decode("0000ab00").unwrap();
        assert_eq!(leading_hex_zeros(&hash), 4);
        assert!(meets_difficulty(&hash, 4));
        assert!(!meets_difficulty(&hash, 5));
    }
}
