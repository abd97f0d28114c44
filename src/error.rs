use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("a chain needs at least a genesis block")]
    EmptyChain,

    #[error("chain failed validation")]
    InvalidChain,

    #[error("tip moved while mining: expected {expected}, found {found}")]
    StaleTip { expected: String, found: String },

    #[error(transparent)]
    Mining(#[from] MiningError),

    #[error("mining task failed: {0}")]
    MiningTask(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MiningError {
    #[error("proof-of-work search was cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}

/// Why a peer contributed nothing to a consensus round.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid peer address {0}")]
    InvalidAddress(String),

    #[error("transport error: {0}")]
    Transport(#[from] hyper::Error),

    #[error("peer answered with status {0}")]
    Status(hyper::StatusCode),

    #[error("malformed chain response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no answer within {0:?}")]
    Timeout(std::time::Duration),
}
