use ledger_core::{Block, Transaction};
use ledger_storage::JsonFileStore;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, JsonFileStore) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = JsonFileStore::new(chain_file(&temp_dir));
    (temp_dir, store)
}

pub fn chain_file(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("blockchain.json")
}

pub fn sample_chain() -> Vec<Block> {
    let genesis = Block::seal(1, "2025-07-06T12:00:00Z", vec![], 1, "0");
    let second = Block::seal(
        2,
        "2025-07-06T13:00:00Z",
        vec![
            Transaction::system("alice", 50.0),
            Transaction::new("alice", "bob", 100.0, Some("sig".into())),
        ],
        93711,
        genesis.hash(),
    );
    vec![genesis, second]
}
