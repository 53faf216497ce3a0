//! Demonstration of generating a fresh keypair and rendering it as a
//! paper wallet PNG. Ties together address derivation and the QR-code
//! renderer without touching the wallet store or any chain state.
//!
//! ```bash
//! cargo run --bin gsc-paper-wallet -- /tmp/paper-wallet.png
//! ```

use std::env;
use std::path::PathBuf;

use gsc_node::wallet::{address, paper};

fn main() {
    let out = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("paper-wallet.png"));

    println!("generating a new keypair...");
    let keypair = address::generate_keypair();
    println!("address:     {}", keypair.address);
    println!("public key:  {}", keypair.public_key);
    println!("private key: {} (keep this secret!)", hex::encode(keypair.private_key));

    println!("rendering paper wallet to {}...", out.display());
    paper::render(&keypair.address, &hex::encode(keypair.private_key), &out)
        .expect("failed to render paper wallet");
    println!("done.");
}
