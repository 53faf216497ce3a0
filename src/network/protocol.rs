//! Wire protocol: JSON messages framed one-per-line over TCP, and the
//! message vocabulary peers exchange.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::chain::{Block, Transaction};
use crate::error::NetworkError;

pub const PROTOCOL_VERSION: u32 = 1;

/// Up to this many records are sent in a single `headers` reply.
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;

/// A block summary sent during header sync, omitting the transaction list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: i64,
    pub previous_hash: String,
    pub merkle_root: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: String,
}

impl From<&Block> for BlockHeader {
    fn from(block: &Block) -> Self {
        Self {
            height: block.height,
            timestamp: block.timestamp,
            previous_hash: block.previous_hash.clone(),
            merkle_root: block.merkle_root.clone(),
            nonce: block.nonce,
            difficulty: block.difficulty,
            hash: block.hash.clone(),
        }
    }
}

/// The full message vocabulary from the peer-session protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Handshake {
        node_id: String,
        version: u32,
        chain_height: u64,
        best_hash: String,
    },
    HandshakeAck {
        node_id: String,
        version: u32,
        chain_height: u64,
        best_hash: String,
    },
    Ping {
        node_id: String,
    },
    Pong {
        node_id: String,
    },
    GetHeaders {
        from_block: String,
    },
    Headers {
        headers: Vec<BlockHeader>,
    },
    GetBlocks {
        from_height: u64,
    },
    Inv {
        hashes: Vec<String>,
    },
    GetData {
        hash: String,
    },
    Block {
        block: Block,
    },
    Mempool,
    RequestMempool,
    Tx {
        transactions: Vec<Transaction>,
    },
    MempoolResponse {
        transactions: Vec<Transaction>,
    },
    RequestBlockchainInfo,
    BlockchainInfoResponse {
        height: u64,
        best_hash: String,
        difficulty: u32,
        supply: i64,
    },
    RequestFullBlockchain,
    BlockchainResponse {
        blocks: Vec<Block>,
    },
    NewBlock {
        block: Block,
        origin_node_id: String,
    },
    NewTransaction {
        transaction: Transaction,
        origin_node_id: String,
        propagated: bool,
    },
    PeerList {
        peers: Vec<String>,
    },
    RequestPeers,
}

/// Write one JSON-encoded message terminated by a newline.
pub async fn write_message(writer: &mut OwnedWriteHalf, message: &Message) -> Result<(), NetworkError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one newline-delimited JSON message. Returns `Ok(None)` on a clean
/// peer disconnect.
pub async fn read_message(reader: &mut BufReader<OwnedReadHalf>) -> Result<Option<Message>, NetworkError> {
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    let message = serde_json::from_str(line.trim_end())
        .map_err(|e| NetworkError::Protocol(e.to_string()))?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_through_json() {
        let msg = Message::Handshake {
            node_id: "abc123".into(),
            version: PROTOCOL_VERSION,
            chain_height: 10,
            best_hash: "deadbeef".into(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert!(matches!(decoded, Message::Handshake { chain_height: 10, .. }));
    }

    #[test]
    fn tag_field_uses_snake_case_type_names() {
        let msg = Message::RequestBlockchainInfo;
        let encoded = serde_json::to_string(&msg).unwrap();
        assert_eq!(encoded, r#"{"type":"request_blockchain_info"}"#);
    }
}
