//! Password-based key derivation for wallet encryption at rest.
//!
//! PBKDF2-HMAC-SHA256 at a configurable iteration count (spec minimum
//! 100,000) derives a 32-byte key suitable for AES-256-GCM.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;

pub const KEY_LEN: usize = 32;

/// Derive a 32-byte key from `passphrase` and `salt` using `iterations`
/// rounds of PBKDF2-HMAC-SHA256.
pub fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), salt, iterations, &mut key)
        .expect("pbkdf2 output length is fixed and valid");
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_same_key() {
        let salt = [7u8; 16];
        let a = derive_key("hunter2", &salt, 1000);
        let b = derive_key("hunter2", &salt, 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn different_passphrase_derives_different_key() {
        let salt = [7u8; 16];
        let a = derive_key("hunter2", &salt, 1000);
        let b = derive_key("hunter3", &salt, 1000);
        assert_ne!(a, b);
    }
}
