use ledger_core::{PeerChain, PeerClient, PeerError};
use std::future::Future;
use std::time::Duration;

pub const FULL_CHAIN_PATH: &str = "/api/full-chain";

/// Fetches peer chains over plain HTTP from their full-chain endpoint.
#[derive(Clone, Debug)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// `host:port` peers are reached over `http://`; explicit schemes are kept.
pub fn full_chain_url(peer: &str) -> String {
    let base = peer.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{FULL_CHAIN_PATH}")
    } else {
        format!("http://{base}{FULL_CHAIN_PATH}")
    }
}

impl PeerClient for HttpPeerClient {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<PeerChain, PeerError>> + Send {
        let client = self.client.clone();
        let url = full_chain_url(peer);
        async move {
            let response = client.get(&url).send().await.map_err(|err| {
                if err.is_timeout() {
                    PeerError::Unreachable(format!("{url}: timed out"))
                } else {
                    PeerError::Unreachable(format!("{url}: {err}"))
                }
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(PeerError::Status(status.as_u16()));
            }
            response
                .json::<PeerChain>()
                .await
                .map_err(|err| PeerError::Malformed(format!("{url}: {err}")))
        }
    }
}
