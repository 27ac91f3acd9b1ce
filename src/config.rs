//! Configuration for parcel-indexer
//!
//! CLI arguments and environment variable handling using clap. Parsed
//! arguments are turned into explicit `GatewayConfig` / `RetryConfig` values
//! that the fetch client and retry engine take by construction.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::error::{ResolverError, Result};

/// Default query parameter carrying a gateway access token
pub const DEFAULT_TOKEN_PARAM: &str = "pinataGatewayToken";

// ============================================================================
// Gateway configuration
// ============================================================================

/// A single IPFS HTTP gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    /// Base URL, e.g. `https://gateway.pinata.cloud/ipfs`
    pub base_url: String,
    /// Access token appended as a query parameter when set
    pub token: Option<String>,
}

impl GatewayEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Ordered, non-empty list of gateways plus HTTP settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    endpoints: Vec<GatewayEndpoint>,
    /// Query parameter name for endpoint tokens
    pub token_param: String,
    /// HTTP timeout for a single fetch
    pub fetch_timeout: Duration,
}

impl GatewayConfig {
    /// Build a config, failing with `NoGatewayConfigured` on an empty list.
    pub fn new(endpoints: Vec<GatewayEndpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(ResolverError::NoGatewayConfigured);
        }
        Ok(Self {
            endpoints,
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            fetch_timeout: Duration::from_secs(30),
        })
    }

    pub fn endpoints(&self) -> &[GatewayEndpoint] {
        &self.endpoints
    }
}

/// Timings for the retry policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Pause after a full pass over all endpoints failed
    pub cycle_delay: Duration,
    /// First backoff delay of the bounded policy, doubled per attempt
    pub base_delay: Duration,
    /// Attempts per endpoint for the bounded policy
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cycle_delay: Duration::from_millis(1500),
            base_delay: Duration::from_millis(1000),
            max_attempts: 3,
        }
    }
}

// ============================================================================
// CLI
// ============================================================================

/// Output format for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Resolve on-chain property data submissions through IPFS gateways
#[derive(Parser, Debug, Clone)]
#[command(name = "parcel-indexer")]
#[command(about = "Resolves property data submissions through IPFS gateways")]
pub struct Args {
    /// Comma-separated gateway base URLs, tried in order
    #[arg(long, env = "GATEWAY_URLS", default_value = "")]
    pub gateway_urls: String,

    /// Comma-separated gateway tokens aligned with GATEWAY_URLS (empty slot = none)
    #[arg(long, env = "GATEWAY_TOKENS")]
    pub gateway_tokens: Option<String>,

    /// Query parameter used to pass gateway tokens
    #[arg(long, env = "GATEWAY_TOKEN_PARAM", default_value = DEFAULT_TOKEN_PARAM)]
    pub gateway_token_param: String,

    /// HTTP timeout for a single gateway fetch, in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "30")]
    pub fetch_timeout_secs: u64,

    /// Delay after every failed pass over all gateways, in milliseconds
    #[arg(long, env = "RETRY_CYCLE_DELAY_MS", default_value = "1500")]
    pub retry_cycle_delay_ms: u64,

    /// Initial backoff for bounded retries, in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "1000")]
    pub retry_base_delay_ms: u64,

    /// Attempts per gateway for bounded retries
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value = "3")]
    pub retry_max_attempts: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the content identifier for a 32-byte hex hash
    Cid {
        /// Hex content hash, `0x` prefix optional
        hash: String,
    },
    /// Fetch a metadata document and resolve its address and property
    Resolve {
        /// Content identifier of the metadata document
        cid: String,
    },
    /// Process a DataSubmitted event end to end
    Process {
        /// Hex hash of the metadata document
        #[arg(long)]
        hash: String,
        #[arg(long)]
        property_hash: String,
        #[arg(long, default_value = "")]
        data_group_hash: String,
        #[arg(long)]
        submitter: String,
        #[arg(long, default_value = "0")]
        block: u64,
        /// Block timestamp, unix seconds
        #[arg(long, default_value = "0")]
        timestamp: i64,
        #[arg(long, default_value = "0")]
        log_index: u64,
        #[arg(long, default_value = "0x0")]
        tx: String,
    },
}

impl Args {
    /// Gateway endpoints in configured order, tokens matched by position
    pub fn gateway_endpoints(&self) -> Vec<GatewayEndpoint> {
        let tokens: Vec<&str> = self
            .gateway_tokens
            .as_deref()
            .map(|t| t.split(',').map(str::trim).collect())
            .unwrap_or_default();

        split_list(&self.gateway_urls)
            .enumerate()
            .map(|(i, url)| {
                let endpoint = GatewayEndpoint::new(url.trim_end_matches('/'));
                match tokens.get(i) {
                    Some(token) if !token.is_empty() => endpoint.with_token(*token),
                    _ => endpoint,
                }
            })
            .collect()
    }

    /// Build the gateway config; fails when no gateway is configured.
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut config = GatewayConfig::new(self.gateway_endpoints())?;
        config.token_param = self.gateway_token_param.clone();
        config.fetch_timeout = Duration::from_secs(self.fetch_timeout_secs);
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            cycle_delay: Duration::from_millis(self.retry_cycle_delay_ms),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_attempts: self.retry_max_attempts.max(1),
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
