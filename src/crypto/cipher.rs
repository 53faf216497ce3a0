//! AES-256-GCM encryption of wallet private-key fields, keyed by
//! [`super::kdf::derive_key`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use thiserror::Error;

pub const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed: wrong key or corrupted ciphertext")]
    Decrypt,
}

/// A ciphertext together with the nonce it was sealed under. Serialized as
/// base64 strings in wallet files.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Seal `plaintext` under `key` with a freshly generated random nonce.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Sealed, CipherError> {
    let cipher = Aes256Gcm::new(key.into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::Encrypt)?;
    Ok(Sealed {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Open a [`Sealed`] value under `key`, returning the original plaintext.
pub fn open(key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>, CipherError> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::from_slice(&sealed.nonce);
    cipher
        .decrypt(nonce, sealed.ciphertext.as_ref())
        .map_err(|_| CipherError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = [42u8; 32];
        let sealed = seal(&key, b"top secret private key").unwrap();
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(opened, b"top secret private key");
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let key = [1u8; 32];
        let wrong_key = [2u8; 32];
        let sealed = seal(&key, b"data").unwrap();
        assert!(open(&wrong_key, &sealed).is_err());
    }
}
