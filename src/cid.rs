//! Content identifier codec
//!
//! Converts the 32-byte sha256 content hashes carried by on-chain events into
//! the CIDv1 strings that IPFS gateways serve documents under.
//!
//! ## Byte layout
//!
//! ```text
//! 0x01 0x55 | 0x12 0x20 | <32 digest bytes>
//! version    sha2-256     digest
//! raw codec  32 bytes
//! ```
//!
//! The envelope is rendered as multibase base32 (lowercase RFC4648, no
//! padding) behind the `b` prefix, e.g. `bafkrei...`. Gateways look documents
//! up by this exact string, so the layout is fixed.

use std::fmt;
use std::str::FromStr;

use cid::multihash::Multihash;
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};

/// SHA2-256 multihash code.
const SHA2_256: u64 = 0x12;

/// `raw` multicodec.
const RAW_CODEC: u64 = 0x55;

/// Digest length every content hash must decode to.
pub const HASH_LENGTH: usize = 32;

/// Multibase prefix for lowercase base32.
pub const BASE32_PREFIX: char = 'b';

/// Content identifier string (CIDv1, raw codec, sha2-256, base32)
///
/// Equal hashes always produce equal identifiers, so the identifier doubles
/// as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    /// Derive the identifier for a hex content hash (`0x` prefix optional).
    pub fn from_hash_hex(hash: &str) -> Result<Self> {
        let trimmed = hash.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(hex_part).map_err(|e| ResolverError::InvalidHex(e.to_string()))?;
        Self::from_digest(&bytes)
    }

    /// Derive the identifier for raw digest bytes.
    pub fn from_digest(digest: &[u8]) -> Result<Self> {
        if digest.len() != HASH_LENGTH {
            return Err(ResolverError::InvalidHashLength {
                actual: digest.len(),
            });
        }

        let hash = Multihash::<64>::wrap(SHA2_256, digest)
            .map_err(|e| ResolverError::InvalidIdentifier(e.to_string()))?;
        Ok(Self(Cid::new_v1(RAW_CODEC, hash).to_string()))
    }

    /// Parse an identifier received from a document link.
    ///
    /// Any valid CID is accepted since linked documents may use other codecs;
    /// only the string form is kept.
    pub fn parse(value: &str) -> Result<Self> {
        let cid = Cid::from_str(value)
            .map_err(|e| ResolverError::InvalidIdentifier(format!("{}: {}", value, e)))?;
        Ok(Self(cid.to_string()))
    }

    /// Hex digest when the identifier is sha2-256 addressed.
    pub fn digest_hex(&self) -> Option<String> {
        let cid = Cid::from_str(&self.0).ok()?;
        let hash = cid.hash();
        if hash.code() != SHA2_256 || hash.digest().len() != HASH_LENGTH {
            return None;
        }
        Some(hex::encode(hash.digest()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentIdentifier {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Encode a hex content hash as a content identifier.
pub fn encode_content_identifier(hash: &str) -> Result<ContentIdentifier> {
    ContentIdentifier::from_hash_hex(hash)
}
