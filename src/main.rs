//! Binary entry point for the GSC node: loads configuration, starts the
//! listener/discovery/miner tasks, and runs until interrupted.

use std::path::PathBuf;

use clap::Parser;
use tokio::signal;

use gsc_node::config::{self, Config};
use gsc_node::Node;

#[derive(Parser, Debug)]
#[command(name = "gsc-node", about = "A proof-of-work cryptocurrency node")]
struct Cli {
    /// Directory holding the chain file, wallets, and config.toml.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Start mining immediately; requires --miner-address or a configured one.
    #[arg(long)]
    mine: bool,

    /// Address credited with mined block rewards.
    #[arg(long)]
    miner_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::create_default_config(cli.data_dir)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level)).init();

    if cli.mine {
        config.mining.enabled = true;
    }
    if let Some(address) = cli.miner_address {
        config.mining.miner_address = Some(address);
    }

    log::info!("starting node, data_dir={}", config.data_dir.display());
    let node = Node::new(config);
    log::info!("node_id={}", node.node_id);

    let handles = node.spawn().await?;

    log::info!("node running, press Ctrl+C to stop");
    signal::ctrl_c().await?;
    log::info!("shutdown signal received, persisting chain state");

    node.stop_mining();
    node.persist()?;
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
