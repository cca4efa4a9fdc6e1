use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node with longest-chain consensus")]
pub struct Config {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// File the chain is persisted to
    #[arg(long, env = "CHAIN_FILE", default_value = "blockchain.json")]
    pub chain_file: PathBuf,

    /// Peer to register at startup (repeatable), e.g. 127.0.0.1:5001
    #[arg(long = "peer", env = "PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Upper bound on each peer fetch during consensus
    #[arg(long, env = "PEER_TIMEOUT_SECS", default_value_t = 5)]
    pub peer_timeout_secs: u64,

    /// Keep the chain in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Search proofs across all cores
    #[arg(long)]
    pub parallel_pow: bool,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}
