use ledger_core::{Block, ChainStore, MemoryStore, StoreError};
use ledger_storage::JsonFileStore;

/// The node's storage choice, fixed at startup.
#[derive(Debug)]
pub enum NodeStore {
    File(JsonFileStore),
    Memory(MemoryStore),
}

impl ChainStore for NodeStore {
    fn load(&self) -> Result<Vec<Block>, StoreError> {
        match self {
            NodeStore::File(store) => store.load(),
            NodeStore::Memory(store) => store.load(),
        }
    }

    fn save(&self, chain: &[Block]) -> Result<(), StoreError> {
        match self {
            NodeStore::File(store) => store.save(chain),
            NodeStore::Memory(store) => store.save(chain),
        }
    }
}
