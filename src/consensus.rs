//! Longest-valid-chain conflict resolution against peer replicas.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blockchain::Block;
use crate::error::FetchError;
use crate::ledger::Chain;
use crate::validate::is_valid;

/// What a peer reports for its chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainResponse {
    pub length: u64,
    pub chain: Vec<Block>,
}

/// Source of peer chains. Any `Err` means the peer is skipped for this round.
pub trait ChainFetcher: Send + Sync {
    fn fetch_chain<'a>(&'a self, peer: &'a str) -> BoxFuture<'a, Result<ChainResponse, FetchError>>;
}

/// Outcome of a consensus round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub adopted: bool,
    pub chain: Chain,
}

/// Picks the longest valid candidate strictly longer than `local_len`.
///
/// `responses` must be in peer order: among equally long winners the first
/// one seen is kept.
pub fn select_longest<'a, I>(local_len: usize, responses: I) -> Option<Chain>
where
    I: IntoIterator<Item = (&'a str, Result<ChainResponse, FetchError>)>,
{
    let mut max_length = local_len as u64;
    let mut best: Option<Vec<Block>> = None;

    for (peer, response) in responses {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(peer, error = %e, "skipping peer");
                continue;
            }
        };

        if response.length as usize != response.chain.len() {
            warn!(
                peer,
                stated = response.length,
                actual = response.chain.len(),
                "peer misreported its chain length"
            );
            continue;
        }
        if response.length <= max_length {
            debug!(peer, length = response.length, max_length, "peer chain not longer");
            continue;
        }
        if !is_valid(&response.chain) {
            warn!(peer, length = response.length, "peer chain failed validation");
            continue;
        }

        debug!(peer, length = response.length, "new best candidate");
        max_length = response.length;
        best = Some(response.chain);
    }

    best.and_then(|blocks| Chain::try_from(blocks).ok())
}

/// Queries every peer concurrently, each under its own timeout, and applies
/// the longest-valid-chain rule.
#[derive(Clone)]
pub struct ConsensusResolver {
    fetcher: Arc<dyn ChainFetcher>,
    peer_timeout: Duration,
}

impl ConsensusResolver {
    pub fn new(fetcher: Arc<dyn ChainFetcher>, peer_timeout: Duration) -> Self {
        Self {
            fetcher,
            peer_timeout,
        }
    }

    /// One result per peer, in the order of `peers` regardless of which
    /// answered first.
    pub async fn fetch_all(&self, peers: &[String]) -> Vec<Result<ChainResponse, FetchError>> {
        let timeout = self.peer_timeout;
        let requests = peers.iter().map(|peer| async move {
            match tokio::time::timeout(timeout, self.fetcher.fetch_chain(peer)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout)),
            }
        });
        join_all(requests).await
    }

    /// The chain that should replace one of `local_len` blocks, if any.
    pub async fn find_candidate(&self, local_len: usize, peers: &[String]) -> Option<Chain> {
        let responses = self.fetch_all(peers).await;
        select_longest(local_len, peers.iter().map(String::as_str).zip(responses))
    }

    /// Returns the adopted peer chain, or `local_chain` untouched.
    pub async fn resolve(&self, local_chain: Chain, peers: &[String]) -> Resolution {
        match self.find_candidate(local_chain.len(), peers).await {
            Some(chain) => {
                info!(old_len = local_chain.len(), new_len = chain.len(), "adopting peer chain");
                Resolution {
                    adopted: true,
                    chain,
                }
            }
            None => Resolution {
                adopted: false,
                chain: local_chain,
            },
        }
    }
}
