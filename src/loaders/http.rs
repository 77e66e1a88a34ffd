//! Token metadata over HTTP.

use super::nft::{MetadataResolver, TokenMetadata};
use super::ReadError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::trace;

/// Public gateway used for `ipfs://` URIs unless configured otherwise.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Fetches token metadata JSON with `reqwest`.
///
/// `ipfs://<cid>/<path>` URIs are rewritten onto an HTTP gateway.
pub struct HttpMetadataResolver {
    client: Client,
    ipfs_gateway: String,
}

impl Default for HttpMetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpMetadataResolver {
    /// Resolver with a 10 second request timeout.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client)
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
        }
    }

    pub fn ipfs_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.ipfs_gateway = gateway.into();
        self
    }

    /// The URL actually requested for `uri`.
    pub fn http_url(&self, uri: &str) -> String {
        match uri.strip_prefix("ipfs://") {
            Some(path) => format!(
                "{}/{}",
                self.ipfs_gateway.trim_end_matches('/'),
                path.trim_start_matches("ipfs/")
            ),
            None => uri.to_string(),
        }
    }
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve(&self, uri: &str) -> Result<TokenMetadata, ReadError> {
        let url = self.http_url(uri);
        trace!(%url, "fetching token metadata");
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ReadError::metadata(uri, e.to_string()))?
            .json::<TokenMetadata>()
            .await
            .map_err(|e| ReadError::metadata(uri, e.to_string()))
    }
}
