//! Error types for content resolution

use thiserror::Error;

/// Resolver error
///
/// Only `NoGatewayConfigured` is allowed to stop the process. Everything else
/// is confined to a single encode call or a single branch of a resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    /// Decoded content hash is not 32 bytes
    #[error("Invalid hash length: expected 32 bytes, got {actual}")]
    InvalidHashLength { actual: usize },

    /// Content hash is not valid hex
    #[error("Invalid hex in content hash: {0}")]
    InvalidHex(String),

    /// String is not a well-formed content identifier
    #[error("Invalid content identifier: {0}")]
    InvalidIdentifier(String),

    /// Connection failure, timeout, or a retriable gateway status
    #[error("Transient network error at {endpoint}: {message}")]
    TransientNetwork { endpoint: String, message: String },

    /// Payload did not match the expected record shape
    #[error("Schema validation failed for {kind}: {message}")]
    SchemaValidation { kind: &'static str, message: String },

    /// Bounded retries exhausted on every gateway
    #[error("Resolution unavailable for {cid} after {attempts} attempts")]
    ResolutionUnavailable { cid: String, attempts: u32 },

    /// No gateway endpoints configured
    #[error("No gateway configured")]
    NoGatewayConfigured,

    /// Caller cancelled an in-flight retry loop
    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolverError {
    pub(crate) fn schema(kind: &'static str, message: impl Into<String>) -> Self {
        ResolverError::SchemaValidation {
            kind,
            message: message.into(),
        }
    }
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;
