//! P2P networking: wire protocol, per-peer session state machine, peer
//! tracking, and discovery, per §4.7.

pub mod discovery;
pub mod peer_manager;
pub mod protocol;
pub mod session;

pub use peer_manager::{PeerHandle, PeerManager};
pub use protocol::{BlockHeader, Message, PROTOCOL_VERSION};

use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;
use tokio::net::TcpListener;

use crate::error::NetworkError;
use crate::miner::SharedState;

/// Bind to `preferred_port`, falling back to each of `fallback_ports` in
/// order if the preferred one is already taken.
pub async fn bind_with_fallback(
    host: &str,
    preferred_port: u16,
    fallback_ports: &[u16],
) -> Result<TcpListener, NetworkError> {
    for port in std::iter::once(preferred_port).chain(fallback_ports.iter().copied()) {
        let addr = format!("{host}:{port}");
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("listening on {addr}");
                return Ok(listener);
            }
            Err(e) => warn!("could not bind {addr}: {e}"),
        }
    }
    Err(NetworkError::Protocol("no configured port was available".into()))
}

/// Accept inbound connections forever, spawning one session task per peer.
pub async fn run_listener(
    listener: TcpListener,
    node_id: String,
    state: Arc<RwLock<SharedState>>,
    peers: Arc<PeerManager>,
) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        if !peers.has_capacity() {
            continue;
        }
        let remote_address = remote.to_string();
        let node_id = node_id.clone();
        let state = state.clone();
        let peers = peers.clone();
        tokio::spawn(async move {
            if let Err(e) = session::run_session(stream, remote_address.clone(), false, node_id, state, peers).await {
                warn!("session with {remote_address} ended: {e}");
            }
        });
    }
}
