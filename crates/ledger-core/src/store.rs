use crate::block::Block;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("chain encoding: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Trait the storage backends implement so the ledger can persist its
/// block sequence. Lives in `ledger-core` to avoid a circular dependency.
/// Only blocks are stored; the pool and peer set are process-local.
pub trait ChainStore: Send + Sync {
    fn load(&self) -> Result<Vec<Block>, StoreError>;
    fn save(&self, chain: &[Block]) -> Result<(), StoreError>;
}

/// Keeps the last saved chain in memory. Used for ephemeral nodes and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<Vec<Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(chain: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(chain),
        }
    }

    pub fn saved(&self) -> Vec<Block> {
        self.blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<Vec<Block>, StoreError> {
        Ok(self.saved())
    }

    fn save(&self, chain: &[Block]) -> Result<(), StoreError> {
        *self.blocks.lock().unwrap_or_else(PoisonError::into_inner) = chain.to_vec();
        Ok(())
    }
}
