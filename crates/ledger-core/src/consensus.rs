//! Longest-valid-chain resolution against registered peers.

use crate::block::Block;
use crate::ledger::Ledger;
use crate::store::ChainStore;
use crate::wallet::SignatureVerifier;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A peer's answer to a full-chain request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerChain {
    pub length: u64,
    pub chain: Vec<Block>,
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("malformed peer response: {0}")]
    Malformed(String),
}

/// Fetches a peer's full chain. Implementations bound each call with a
/// timeout and report it as [`PeerError::Unreachable`].
pub trait PeerClient: Send + Sync {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<PeerChain, PeerError>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// No peer offered a longer valid chain; ours stands.
    Authoritative,
    /// The local chain was replaced by a peer's.
    Replaced,
}

impl<S: ChainStore, V: SignatureVerifier> Ledger<S, V> {
    /// Asks every registered peer for its chain and adopts the longest valid
    /// one that is strictly longer than ours. The lock is only taken to read
    /// the peer set and to swap the chain; fetches run unlocked. Peers that
    /// fail are skipped. Among equally long candidates the first one
    /// evaluated wins (peers are visited in sorted order).
    pub async fn resolve_conflicts<C: PeerClient>(&self, client: &C) -> Resolution {
        let peers = self.nodes();
        let mut best_length = self.chain_length() as u64;
        let mut candidate: Option<Vec<Block>> = None;

        for peer in peers {
            let reply = match client.fetch_chain(&peer).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(%peer, error = %err, "skipping peer");
                    continue;
                }
            };
            if reply.length != reply.chain.len() as u64 {
                warn!(
                    %peer,
                    reported = reply.length,
                    actual = reply.chain.len(),
                    "skipping peer: length does not match chain"
                );
                continue;
            }
            if reply.length <= best_length {
                debug!(%peer, length = reply.length, best_length, "peer chain not longer");
                continue;
            }
            if let Err(fault) = self.check(&reply.chain) {
                warn!(%peer, %fault, "skipping peer: invalid chain");
                continue;
            }
            info!(%peer, length = reply.length, "found longer valid chain");
            best_length = reply.length;
            candidate = Some(reply.chain);
        }

        match candidate {
            Some(chain) => {
                if self.replace_if_longer(chain) {
                    Resolution::Replaced
                } else {
                    Resolution::Authoritative
                }
            }
            None => Resolution::Authoritative,
        }
    }
}
