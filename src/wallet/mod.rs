//! Wallet subsystem: non-cryptographic address derivation, encrypted-at-rest
//! key storage, and paper-wallet export.

pub mod address;
pub mod paper;
pub mod store;

pub use address::{generate_keypair, Keypair};
pub use store::{AddressEntry, ContactEntry, OpenWallet, WalletFile, WalletStore};
