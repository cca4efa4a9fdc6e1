pub mod config;
pub mod error;
pub mod peer_client;
pub mod routes;
pub mod store;

use anyhow::Result;
use config::Config;
use ledger_core::{Ledger, MemoryStore, P256Verifier};
use ledger_storage::JsonFileStore;
use peer_client::HttpPeerClient;
use std::sync::Arc;
use store::NodeStore;
use tracing::{info, warn};

pub type NodeLedger = Ledger<NodeStore, P256Verifier>;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<NodeLedger>,
    pub peers: Arc<HttpPeerClient>,
    pub parallel_pow: bool,
}

impl AppState {
    pub fn new(ledger: Arc<NodeLedger>, peers: HttpPeerClient) -> Self {
        Self {
            ledger,
            peers: Arc::new(peers),
            parallel_pow: false,
        }
    }

    /// Opens (or mints) the chain the config points at and registers the
    /// configured peers.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = if config.ephemeral {
            info!("running with an in-memory chain");
            NodeStore::Memory(MemoryStore::new())
        } else {
            info!(path = %config.chain_file.display(), "using chain file");
            NodeStore::File(JsonFileStore::new(&config.chain_file))
        };
        let ledger = Ledger::open(Arc::new(store), Arc::new(P256Verifier));
        for peer in &config.peers {
            if let Err(err) = ledger.register_node(peer) {
                warn!(%peer, error = %err, "ignoring configured peer");
            }
        }

        let peers = HttpPeerClient::new(config.peer_timeout())?;
        let mut state = Self::new(Arc::new(ledger), peers);
        state.parallel_pow = config.parallel_pow;
        Ok(state)
    }
}

pub use routes::router;
