use futures::future::BoxFuture;
use hyper::client::HttpConnector;
use hyper::{body, Client, Uri};
use tracing::debug;

use crate::consensus::{ChainFetcher, ChainResponse};
use crate::error::FetchError;

/// Fetches `GET http://{peer}/chain` from `host:port` peers.
#[derive(Clone, Default)]
pub struct HttpChainFetcher {
    client: Client<HttpConnector>,
}

impl HttpChainFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

fn chain_uri(peer: &str) -> Result<Uri, FetchError> {
    format!("http://{}/chain", peer)
        .parse()
        .map_err(|_| FetchError::InvalidAddress(peer.to_string()))
}

impl ChainFetcher for HttpChainFetcher {
    fn fetch_chain<'a>(
        &'a self,
        peer: &'a str,
    ) -> BoxFuture<'a, Result<ChainResponse, FetchError>> {
        Box::pin(async move {
            let uri = chain_uri(peer)?;
            debug!(%uri, "requesting peer chain");

            let response = self.client.get(uri).await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status()));
            }
            let bytes = body::to_bytes(response.into_body()).await?;
            Ok(serde_json::from_slice(&bytes)?)
        })
    }
}
