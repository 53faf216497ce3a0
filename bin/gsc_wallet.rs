//! Wallet management CLI: create/open wallets, generate addresses, and
//! export a paper wallet, operating on the same `WalletStore` the node
//! process uses.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gsc_node::config;
use gsc_node::wallet::{paper, WalletStore};

#[derive(Parser)]
#[command(name = "gsc-wallet", about = "GSC wallet management CLI")]
struct Cli {
    /// Directory holding wallet files; defaults to the node's data dir.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet.
    Create {
        name: String,
        /// Encrypt the wallet's private keys with this passphrase.
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// List every wallet in the store.
    List,
    /// Print a wallet's master address.
    Address {
        name: String,
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Generate an additional address inside an existing wallet.
    NewAddress {
        name: String,
        label: String,
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Render a paper wallet PNG for the wallet's master address.
    ExportPaper {
        name: String,
        out: PathBuf,
        #[arg(long)]
        passphrase: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config::Config::default().wallets_dir());
    let mut store = WalletStore::new(data_dir)?;

    match cli.command {
        Commands::Create { name, passphrase } => {
            store.create(&name, passphrase.as_deref())?;
            let address = store.open_wallet().unwrap().file.master_address.clone();
            println!("wallet '{name}' created");
            println!("address: {address}");
            if passphrase.is_none() {
                println!("warning: this wallet's private keys are stored unencrypted");
            }
        }
        Commands::List => {
            for name in store.list_wallets()? {
                println!("{name}");
            }
        }
        Commands::Address { name, passphrase } => {
            store.open(&name, passphrase.as_deref())?;
            println!("{}", store.open_wallet().unwrap().file.master_address);
        }
        Commands::NewAddress { name, label, passphrase } => {
            store.open(&name, passphrase.as_deref())?;
            let address = store.generate_address(&label)?;
            println!("{address}");
        }
        Commands::ExportPaper { name, out, passphrase } => {
            store.open(&name, passphrase.as_deref())?;
            let handle = store.open_wallet().unwrap();
            let address = handle.file.master_address.clone();
            let private_key = handle.private_key_for(&address)?;
            paper::render(&address, &hex::encode(private_key), &out)?;
            println!("paper wallet written to {}", out.display());
        }
    }

    Ok(())
}
