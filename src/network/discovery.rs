//! Bootstrap dialing and opportunistic peer discovery.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::RwLock;
use tokio::net::TcpStream;

use super::peer_manager::PeerManager;
use super::session;
use crate::miner::SharedState;

/// Open a best-effort session to every seed address. Failures are logged
/// and otherwise ignored; a seed that never comes up simply contributes no
/// peer.
pub async fn dial_seeds(
    seeds: Vec<String>,
    node_id: String,
    state: Arc<RwLock<SharedState>>,
    peers: Arc<PeerManager>,
) {
    for address in seeds {
        dial_one(address, node_id.clone(), state.clone(), peers.clone()).await;
    }
}

async fn dial_one(address: String, node_id: String, state: Arc<RwLock<SharedState>>, peers: Arc<PeerManager>) {
    if peers.is_connected(&address) || !peers.has_capacity() {
        return;
    }
    match TcpStream::connect(&address).await {
        Ok(stream) => {
            let session_address = address.clone();
            tokio::spawn(async move {
                if let Err(e) = session::run_session(stream, session_address.clone(), true, node_id, state, peers).await {
                    warn!("session with {session_address} ended: {e}");
                }
            });
        }
        Err(e) => debug!("could not connect to seed {address}: {e}"),
    }
}

/// Periodically connect to peer addresses learned via `peer_list`, up to
/// the configured cap. Runs until the process exits.
pub async fn run_discovery_loop(
    interval: Duration,
    node_id: String,
    state: Arc<RwLock<SharedState>>,
    peers: Arc<PeerManager>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let candidates = peers.take_connectable_candidates();
        for address in candidates {
            dial_one(address, node_id.clone(), state.clone(), peers.clone()).await;
        }
    }
}
