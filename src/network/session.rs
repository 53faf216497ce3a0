//! Per-peer session: handshake, then the headers → blocks → mempool → live
//! sync state machine described in §4.7.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::peer_manager::{PeerHandle, PeerManager};
use super::protocol::{self, BlockHeader, Message, PROTOCOL_VERSION};
use crate::chain::Block;
use crate::error::NetworkError;
use crate::miner::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncPhase {
    Headers,
    Blocks,
    Mempool,
    Live,
}

fn chain_snapshot(state: &RwLock<SharedState>) -> (u64, String) {
    let guard = state.read();
    let tip = guard.chain.tip();
    (tip.height, tip.hash.clone())
}

/// Drive one peer connection end to end. `remote_address` is the
/// `host:port` this session is registered under for broadcast exclusion.
pub async fn run_session(
    stream: TcpStream,
    remote_address: String,
    initiator: bool,
    node_id: String,
    state: Arc<RwLock<SharedState>>,
    peers: Arc<PeerManager>,
) -> Result<(), NetworkError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (local_height, local_best_hash) = chain_snapshot(&state);

    let peer_info = if initiator {
        protocol::write_message(
            &mut write_half,
            &Message::Handshake {
                node_id: node_id.clone(),
                version: PROTOCOL_VERSION,
                chain_height: local_height,
                best_hash: local_best_hash.clone(),
            },
        )
        .await?;
        match protocol::read_message(&mut reader).await? {
            Some(Message::HandshakeAck {
                node_id: peer_node_id,
                chain_height,
                best_hash,
                ..
            }) => (peer_node_id, chain_height, best_hash),
            _ => return Err(NetworkError::Protocol("expected handshake_ack".into())),
        }
    } else {
        match protocol::read_message(&mut reader).await? {
            Some(Message::Handshake {
                node_id: peer_node_id,
                chain_height,
                best_hash,
                ..
            }) => {
                protocol::write_message(
                    &mut write_half,
                    &Message::HandshakeAck {
                        node_id: node_id.clone(),
                        version: PROTOCOL_VERSION,
                        chain_height: local_height,
                        best_hash: local_best_hash.clone(),
                    },
                )
                .await?;
                (peer_node_id, chain_height, best_hash)
            }
            _ => return Err(NetworkError::Protocol("expected handshake".into())),
        }
    };
    let (peer_node_id, peer_chain_height, _peer_best_hash) = peer_info;
    info!("handshake complete with {remote_address} (node_id={peer_node_id})");

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    peers.register(&remote_address, PeerHandle { outbox: outbox_tx });

    let mut phase = if peer_chain_height > local_height {
        SyncPhase::Headers
    } else {
        SyncPhase::Live
    };

    let result = drive_session(
        &mut reader,
        &mut write_half,
        &mut phase,
        &remote_address,
        &state,
        &peers,
        &mut outbox_rx,
    )
    .await;

    // Drain remaining unbounded backlog isn't needed; drop the receiver on
    // teardown to close the channel.
    drop(outbox_rx);
    peers.remove(&remote_address);
    result
}

async fn drive_session(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    phase: &mut SyncPhase,
    remote_address: &str,
    state: &Arc<RwLock<SharedState>>,
    peers: &Arc<PeerManager>,
    outbox_rx: &mut mpsc::UnboundedReceiver<Message>,
) -> Result<(), NetworkError> {

    if *phase == SyncPhase::Headers {
        sync_headers(reader, writer, state).await?;
        *phase = SyncPhase::Blocks;
    }
    if *phase == SyncPhase::Blocks {
        *phase = SyncPhase::Mempool;
    }
    if *phase == SyncPhase::Mempool {
        sync_mempool(reader, writer, state).await?;
        *phase = SyncPhase::Live;
        debug!("sync_complete with {remote_address}");
    }

    loop {
        tokio::select! {
            incoming = protocol::read_message(reader) => {
                match incoming? {
                    None => return Ok(()),
                    Some(message) => handle_live_message(message, remote_address, state, peers, writer).await?,
                }
            }
            outgoing = outbox_rx.recv() => {
                match outgoing {
                    Some(message) => protocol::write_message(writer, &message).await?,
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn sync_headers(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    state: &Arc<RwLock<SharedState>>,
) -> Result<(), NetworkError> {
    let (_, local_best_hash) = chain_snapshot(state);
    protocol::write_message(writer, &Message::GetHeaders { from_block: local_best_hash }).await?;

    let headers = match protocol::read_message(reader).await? {
        Some(Message::Headers { headers }) => headers,
        Some(other) => {
            return Err(NetworkError::Protocol(format!("expected headers, got {other:?}")))
        }
        None => return Ok(()),
    };

    for header in headers {
        request_and_apply_block(reader, writer, state, &header).await?;
    }
    Ok(())
}

async fn request_and_apply_block(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    state: &Arc<RwLock<SharedState>>,
    header: &BlockHeader,
) -> Result<(), NetworkError> {
    {
        let guard = state.read();
        if header.height <= guard.chain.height() {
            return Ok(());
        }
    }
    protocol::write_message(writer, &Message::GetData { hash: header.hash.clone() }).await?;
    match protocol::read_message(reader).await? {
        Some(Message::Block { block }) => {
            apply_remote_block(state, block);
            Ok(())
        }
        Some(other) => Err(NetworkError::Protocol(format!("expected block, got {other:?}"))),
        None => Ok(()),
    }
}

fn apply_remote_block(state: &Arc<RwLock<SharedState>>, block: Block) {
    let mut guard = state.write();
    let _ = guard.chain.append_block(block);
}

async fn sync_mempool(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    state: &Arc<RwLock<SharedState>>,
) -> Result<(), NetworkError> {
    protocol::write_message(writer, &Message::RequestMempool).await?;
    match protocol::read_message(reader).await? {
        Some(Message::MempoolResponse { transactions }) | Some(Message::Tx { transactions }) => {
            let mut guard = state.write();
            let SharedState { chain, mempool } = &mut *guard;
            for tx in transactions {
                let _ = mempool.admit(tx, chain);
            }
            Ok(())
        }
        Some(other) => Err(NetworkError::Protocol(format!("expected mempool response, got {other:?}"))),
        None => Ok(()),
    }
}

async fn handle_live_message(
    message: Message,
    remote_address: &str,
    state: &Arc<RwLock<SharedState>>,
    peers: &Arc<PeerManager>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
) -> Result<(), NetworkError> {
    match message {
        Message::Ping { node_id } => {
            protocol::write_message(writer, &Message::Pong { node_id }).await?;
        }
        Message::GetHeaders { from_block } => {
            let headers = {
                let guard = state.read();
                guard
                    .chain
                    .blocks()
                    .iter()
                    .skip_while(|b| b.hash != from_block)
                    .skip(1)
                    .take(protocol::MAX_HEADERS_PER_MESSAGE)
                    .map(BlockHeader::from)
                    .collect()
            };
            protocol::write_message(writer, &Message::Headers { headers }).await?;
        }
        Message::GetData { hash } => {
            let block = {
                let guard = state.read();
                guard.chain.blocks().iter().find(|b| b.hash == hash).cloned()
            };
            if let Some(block) = block {
                protocol::write_message(writer, &Message::Block { block }).await?;
            }
        }
        Message::RequestMempool | Message::Mempool => {
            let transactions = {
                let guard = state.read();
                guard.mempool.iter().cloned().collect()
            };
            protocol::write_message(writer, &Message::MempoolResponse { transactions }).await?;
        }
        Message::RequestBlockchainInfo => {
            let guard = state.read();
            let tip = guard.chain.tip();
            let supply: i64 = guard
                .chain
                .blocks()
                .iter()
                .flat_map(|b| b.transactions.iter())
                .filter(|tx| tx.is_coinbase() || tx.is_genesis())
                .map(|tx| tx.amount as i64)
                .sum();
            protocol::write_message(
                writer,
                &Message::BlockchainInfoResponse {
                    height: tip.height,
                    best_hash: tip.hash.clone(),
                    difficulty: tip.difficulty,
                    supply,
                },
            )
            .await?;
        }
        Message::RequestFullBlockchain => {
            let blocks = state.read().chain.blocks().to_vec();
            protocol::write_message(writer, &Message::BlockchainResponse { blocks }).await?;
        }
        Message::BlockchainResponse { blocks } => {
            // A competing, possibly-longer chain from a peer. `try_replace`
            // is a no-op unless it is both strictly longer and fully valid.
            let mut guard = state.write();
            if guard.chain.try_replace(blocks).is_ok() {
                let SharedState { chain, mempool } = &mut *guard;
                mempool.reevaluate(chain);
                info!("replaced local chain with peer {remote_address}'s longer chain");
            }
        }
        Message::RequestPeers => {
            let addresses = peers.connected_addresses();
            protocol::write_message(writer, &Message::PeerList { peers: addresses }).await?;
        }
        Message::PeerList { peers: addresses } => {
            peers.note_candidates(addresses);
        }
        Message::NewBlock { block, origin_node_id } => {
            let accepted = {
                let mut guard = state.write();
                guard.chain.append_block(block.clone()).is_ok()
            };
            if accepted {
                peers.broadcast(Message::NewBlock { block, origin_node_id }, Some(remote_address));
            }
        }
        Message::NewTransaction {
            transaction,
            origin_node_id,
            propagated,
        } => {
            let admitted = {
                let mut guard = state.write();
                let SharedState { chain, mempool } = &mut *guard;
                mempool.admit(transaction.clone(), chain).is_ok()
            };
            if admitted {
                peers.broadcast(
                    Message::NewTransaction {
                        transaction,
                        origin_node_id,
                        propagated,
                    },
                    Some(remote_address),
                );
            }
        }
        other => {
            warn!("unexpected message in live phase from {remote_address}: {other:?}");
        }
    }
    Ok(())
}
