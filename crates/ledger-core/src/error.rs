use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("invalid signature for sender {0}")]
    InvalidSignature(String),
    #[error("malformed peer address: {0:?}")]
    MalformedPeer(String),
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("chain tip moved from block {expected} while mining")]
    StaleTip { expected: u64 },
    #[error("mining cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
