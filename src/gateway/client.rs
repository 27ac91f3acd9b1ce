//! Single-shot HTTP fetch against one IPFS gateway
//!
//! No retry logic lives here. The client issues exactly one GET per call and
//! reports what happened as a `FetchOutcome` for the retry engine to classify.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::cid::ContentIdentifier;
use crate::config::{GatewayConfig, GatewayEndpoint};
use crate::error::{ResolverError, Result};

/// Transport-level failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Decode,
    Other,
}

/// Result of one GET against one gateway
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 2xx with a JSON body
    Document(Value),
    /// Non-success HTTP status
    Status(u16),
    /// Request never produced a usable response
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
}

/// Anything that can fetch a document from a gateway
///
/// Implemented by `GatewayClient`; tests substitute scripted fetchers.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Ordered gateway list to cycle through
    fn endpoints(&self) -> &[GatewayEndpoint];

    /// Issue exactly one fetch of `cid` from `endpoint`.
    async fn fetch(&self, cid: &ContentIdentifier, endpoint: &GatewayEndpoint) -> FetchOutcome;
}

/// HTTP client for IPFS gateways
pub struct GatewayClient {
    config: GatewayConfig,
    client: Client,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| ResolverError::TransientNetwork {
                endpoint: "client".to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// URL for `cid` on `endpoint`, without the token
    pub fn document_url(endpoint: &GatewayEndpoint, cid: &ContentIdentifier) -> String {
        format!("{}/{}", endpoint.base_url.trim_end_matches('/'), cid)
    }
}

#[async_trait]
impl DocumentFetcher for GatewayClient {
    fn endpoints(&self) -> &[GatewayEndpoint] {
        self.config.endpoints()
    }

    async fn fetch(&self, cid: &ContentIdentifier, endpoint: &GatewayEndpoint) -> FetchOutcome {
        let url = Self::document_url(endpoint, cid);

        let mut request = self.client.get(&url);
        if let Some(ref token) = endpoint.token {
            request = request.query(&[(self.config.token_param.as_str(), token.as_str())]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return transport_outcome(&e),
        };

        let status = response.status();
        if !status.is_success() {
            debug!(cid = %cid, url = %url, status = status.as_u16(), "Gateway returned error status");
            return FetchOutcome::Status(status.as_u16());
        }

        match response.json::<Value>().await {
            Ok(body) => {
                debug!(cid = %cid, url = %url, "Fetched document");
                FetchOutcome::Document(body)
            }
            Err(e) => transport_outcome(&e),
        }
    }
}

fn transport_outcome(error: &reqwest::Error) -> FetchOutcome {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_decode() {
        TransportErrorKind::Decode
    } else {
        TransportErrorKind::Other
    };

    FetchOutcome::Transport {
        kind,
        message: error.to_string(),
    }
}
