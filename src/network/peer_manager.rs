//! Tracks connected peers and fans broadcasts out to them, with
//! exclusion-by-sender loop avoidance per §4.7.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::protocol::Message;

/// Outbound channel to a single connected peer's writer task.
#[derive(Clone)]
pub struct PeerHandle {
    pub outbox: mpsc::UnboundedSender<Message>,
}

pub struct PeerManager {
    peers: Mutex<HashMap<String, PeerHandle>>,
    /// Addresses learned via `peer_list` but not yet connected to.
    candidates: Mutex<HashSet<String>>,
    max_peers: usize,
}

impl PeerManager {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            candidates: Mutex::new(HashSet::new()),
            max_peers,
        }
    }

    pub fn connected_count(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn has_capacity(&self) -> bool {
        self.connected_count() < self.max_peers
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.peers.lock().contains_key(address)
    }

    pub fn register(&self, address: &str, handle: PeerHandle) {
        self.peers.lock().insert(address.to_string(), handle);
    }

    pub fn remove(&self, address: &str) {
        self.peers.lock().remove(address);
    }

    pub fn connected_addresses(&self) -> Vec<String> {
        self.peers.lock().keys().cloned().collect()
    }

    /// Send `message` to every connected peer except `exclude` (the
    /// address the message originated from, if any).
    pub fn broadcast(&self, message: Message, exclude: Option<&str>) {
        let peers = self.peers.lock();
        for (address, handle) in peers.iter() {
            if Some(address.as_str()) == exclude {
                continue;
            }
            // A closed receiver means the session is tearing down; its own
            // disconnect handling will call `remove`.
            let _ = handle.outbox.send(message.clone());
        }
    }

    pub fn note_candidates(&self, addresses: impl IntoIterator<Item = String>) {
        let mut candidates = self.candidates.lock();
        for addr in addresses {
            candidates.insert(addr);
        }
    }

    /// Candidate addresses not yet connected, up to the remaining capacity.
    pub fn take_connectable_candidates(&self) -> Vec<String> {
        let remaining = self.max_peers.saturating_sub(self.connected_count());
        if remaining == 0 {
            return Vec::new();
        }
        let connected = self.peers.lock();
        let mut candidates = self.candidates.lock();
        let chosen: Vec<String> = candidates
            .iter()
            .filter(|addr| !connected.contains_key(addr.as_str()))
            .take(remaining)
            .cloned()
            .collect();
        for addr in &chosen {
            candidates.remove(addr);
        }
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_the_excluded_peer() {
        let manager = PeerManager::new(8);
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.register("a:1", PeerHandle { outbox: tx_a });
        manager.register("b:1", PeerHandle { outbox: tx_b });

        manager.broadcast(Message::RequestPeers, Some("a:1"));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn candidates_respect_remaining_capacity() {
        let manager = PeerManager::new(1);
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        manager.register("a:1", PeerHandle { outbox: tx_a });
        manager.note_candidates(["b:1".to_string(), "c:1".to_string()]);
        assert!(manager.take_connectable_candidates().is_empty());
    }
}
