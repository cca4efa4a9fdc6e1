use ledger_core::{Block, ChainStore, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persists the block sequence as a pretty-printed JSON array in one file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Block>, StoreError> {
        load_chain(&self.path)
    }

    fn save(&self, chain: &[Block]) -> Result<(), StoreError> {
        save_chain(&self.path, chain)
    }
}

/// Writes `chain` to a sibling temp file, then renames it over `path` so a
/// crash mid-write never leaves a truncated chain behind.
pub fn save_chain<P: AsRef<Path>>(path: P, chain: &[Block]) -> Result<(), StoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(chain)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), blocks = chain.len(), "chain saved");
    Ok(())
}

pub fn load_chain<P: AsRef<Path>>(path: P) -> Result<Vec<Block>, StoreError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let chain: Vec<Block> = serde_json::from_slice(&bytes)?;
    debug!(path = %path.display(), blocks = chain.len(), "chain loaded");
    Ok(chain)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "chain".into());
    name.push(".tmp");
    path.with_file_name(name)
}
