use thiserror::Error;

/// Errors raised by the chain/state engine.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block is not intrinsically valid: {0}")]
    IntrinsicallyInvalid(String),
    #[error("block fails contextual validation against tip: {0}")]
    ContextInvalid(String),
    #[error("block height {got} does not follow tip height {expected}")]
    HeightMismatch { got: u64, expected: u64 },
    #[error("replacement chain is not strictly longer than the current chain")]
    NotLonger,
    #[error("replacement chain failed full validation")]
    ReplacementInvalid,
    #[error("chain is empty")]
    Empty,
}

/// Errors raised by mempool admission.
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("transaction is not intrinsically valid: {0}")]
    IntrinsicallyInvalid(String),
    #[error("transaction {0} is already present in the mempool")]
    Duplicate(String),
    #[error("sender {sender} has insufficient balance: needs {needed}, has {available}")]
    InsufficientBalance {
        sender: String,
        needed: i64,
        available: i64,
    },
}

/// Errors raised by the mining loop.
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("a mining job is already running")]
    AlreadyMining,
    #[error("mining was cancelled")]
    Cancelled,
    #[error("mined block lost the race to append: {0}")]
    Collision(#[from] ChainError),
}

/// Errors raised by wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet '{0}' not found")]
    NotFound(String),
    #[error("wallet '{0}' already exists")]
    AlreadyExists(String),
    #[error("no wallet is currently open")]
    NoneOpen,
    #[error("incorrect passphrase")]
    DecryptFailed,
    #[error("wallet is not encrypted")]
    NotEncrypted,
    #[error("wallet is already encrypted")]
    AlreadyEncrypted,
    #[error("address '{0}' not found in wallet")]
    AddressNotFound(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("paper wallet rendering failed: {0}")]
    Render(String),
}

/// Errors raised by the P2P network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("peer {0} is unreachable")]
    PeerUnreachable(String),
    #[error("peer {0} timed out")]
    Timeout(String),
    #[error("malformed message: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised by chain/wallet persistence.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to load from {path}: {source}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to save to {path}: {source}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Top-level error aggregating every subsystem error.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Miner(#[from] MinerError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
