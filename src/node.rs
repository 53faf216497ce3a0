//! Orchestrator wiring the chain, mempool, miner, network, and persistence
//! together, per §5's thread-of-control model.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, info};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::chain::RewardSchedule;
use crate::config::Config;
use crate::crypto::sha256_hex;
use crate::error::{NodeError, Result};
use crate::mempool::Mempool;
use crate::miner::{mine_one_block, CancelToken, MiningProgress, SharedState};
use crate::network::{self, PeerManager};
use crate::persistence;

/// `node_id` is stable for the process lifetime: the first 16 hex
/// characters of `SHA-256(hostname || current_unix_time)`, matching
/// the network layer's handshake field.
fn generate_node_id() -> String {
    let hostname = hostname_best_effort();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the epoch")
        .as_secs();
    let input = format!("{hostname}{now}");
    sha256_hex(input.as_bytes())[..16].to_string()
}

fn hostname_best_effort() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

pub struct Node {
    pub config: Config,
    pub node_id: String,
    pub state: Arc<RwLock<SharedState>>,
    pub peers: Arc<PeerManager>,
    mining_cancel: CancelToken,
}

impl Node {
    pub fn new(config: Config) -> Self {
        let reward_schedule = RewardSchedule::new(config.mining.initial_reward, config.mining.halving_interval);
        let (chain, mempool, _difficulty) =
            persistence::load(&config.chain_file(), reward_schedule, config.mining.difficulty);

        Self {
            node_id: generate_node_id(),
            state: Arc::new(RwLock::new(SharedState { chain, mempool })),
            peers: Arc::new(PeerManager::new(config.network.max_peers)),
            mining_cancel: CancelToken::new(),
            config,
        }
    }

    pub fn persist(&self) -> Result<()> {
        let guard = self.state.read();
        persistence::save(&self.config.chain_file(), &guard.chain, &guard.mempool, self.config.mining.difficulty)
            .map_err(NodeError::from)
    }

    /// Spawn the listener, discovery loop, and (if configured) miner
    /// worker. Returns their join handles so a caller can await shutdown.
    pub async fn spawn(&self) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();

        let listener = network::bind_with_fallback(
            &self.config.network.listen_addr.ip().to_string(),
            self.config.network.listen_addr.port(),
            &self.config.network.fallback_ports,
        )
        .await?;

        handles.push(tokio::spawn(network::run_listener(
            listener,
            self.node_id.clone(),
            self.state.clone(),
            self.peers.clone(),
        )));

        handles.push(tokio::spawn(network::discovery::dial_seeds(
            self.config.network.seed_addresses.clone(),
            self.node_id.clone(),
            self.state.clone(),
            self.peers.clone(),
        )));

        handles.push(tokio::spawn(network::discovery::run_discovery_loop(
            Duration::from_secs(self.config.network.peer_discovery_interval_secs),
            self.node_id.clone(),
            self.state.clone(),
            self.peers.clone(),
        )));

        if self.config.mining.enabled {
            if let Some(address) = self.config.mining.miner_address.clone() {
                handles.push(self.spawn_miner(address));
            }
        }

        Ok(handles)
    }

    fn spawn_miner(&self, miner_address: String) -> JoinHandle<()> {
        let state = self.state.clone();
        let difficulty = self.config.mining.difficulty;
        let max_transactions = self.config.mining.max_transactions_per_block;
        let checkpoint_nonces = self.config.mining.progress_checkpoint_nonces;
        let cancel = self.mining_cancel.clone();

        tokio::task::spawn_blocking(move || loop {
            if cancel.is_cancelled() {
                return;
            }
            let report = |p: MiningProgress| {
                info!("mining: nonce={} hashes/sec={:.0}", p.nonce, p.hashes_per_second);
            };
            match mine_one_block(&state, &miner_address, difficulty, max_transactions, checkpoint_nonces, &cancel, report) {
                Ok(block) => info!("mined block {} ({})", block.height, block.hash),
                Err(e) => {
                    error!("mining stopped: {e}");
                    return;
                }
            }
        })
    }

    pub fn stop_mining(&self) {
        self.mining_cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_sixteen_hex_characters() {
        let id = generate_node_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
