//! Address & keypair derivation (§4.6). This is an explicitly
//! non-cryptographic placeholder scheme — "signatures" elsewhere in this
//! crate are SHA-256 hashes, not real EC signatures — carried forward as-is
//! per the open-question resolution recorded in `DESIGN.md`.

use crate::crypto::sha256;
use rand::RngCore;

pub const ADDRESS_PREFIX: &str = "GSC1";

#[derive(Debug, Clone)]
pub struct Keypair {
    pub private_key: [u8; 32],
    pub address: String,
    pub public_key: String,
}

/// Generate 32 random bytes via a CSPRNG.
pub fn generate_private_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Derive the address for `private_key` per §4.6's five-step scheme.
pub fn derive_address(private_key: &[u8; 32]) -> String {
    let mut pubkey_input = private_key.to_vec();
    pubkey_input.extend_from_slice(b"GSC_PUBLIC");
    let pubkey_hash_full = sha256(&pubkey_input);
    let pubkey_hash = &pubkey_hash_full[..20];

    let mut checksum_input = b"GSC".to_vec();
    checksum_input.extend_from_slice(pubkey_hash);
    let checksum_full = sha256(&sha256(&checksum_input));
    let checksum = &checksum_full[..4];

    let mut payload = pubkey_hash.to_vec();
    payload.extend_from_slice(checksum);

    let payload_hex = hex::encode(payload);
    format!("{ADDRESS_PREFIX}{}", &payload_hex[..32])
}

/// The "public key" exposed only for display, per §4.6.
pub fn derive_public_key(private_key: &[u8; 32]) -> String {
    let mut input = private_key.to_vec();
    input.extend_from_slice(b"GSC_PUBKEY");
    hex::encode(sha256(&input))
}

/// Generate a brand-new keypair with its derived address and display
/// public key.
pub fn generate_keypair() -> Keypair {
    let private_key = generate_private_key();
    let address = derive_address(&private_key);
    let public_key = derive_public_key(&private_key);
    Keypair {
        private_key,
        address,
        public_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let key = [7u8; 32];
        assert_eq!(derive_address(&key), derive_address(&key));
        assert_eq!(derive_public_key(&key), derive_public_key(&key));
    }

    #[test]
    fn address_has_expected_prefix_and_length() {
        let key = [3u8; 32];
        let address = derive_address(&key);
        assert!(address.starts_with(ADDRESS_PREFIX));
        assert_eq!(address.len(), ADDRESS_PREFIX.len() + 32);
    }

    #[test]
    fn different_keys_derive_different_addresses() {
        let a = derive_address(&[1u8; 32]);
        let b = derive_address(&[2u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn paper_wallet_round_trip_scenario_6() {
        let keypair = generate_keypair();
        // Reimporting the same private key into a fresh derivation yields
        // the same address.
        assert_eq!(derive_address(&keypair.private_key), keypair.address);
    }
}
