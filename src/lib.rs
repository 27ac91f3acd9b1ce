//! parcel-indexer - property data resolution over IPFS gateways
//!
//! On-chain `DataSubmitted` events carry the sha256 of an off-chain metadata
//! document. This crate turns that hash into a content identifier, fetches the
//! document graph it roots through a list of IPFS gateways, and materializes
//! the address and property records it links to.
//!
//! ## Components
//!
//! - **cid**: content hash → CIDv1 codec
//! - **gateway**: single-shot gateway client and the infinite / bounded retry policies
//! - **cache**: process-wide effect cache joining duplicate fetches
//! - **validate**: per-record-kind validators and transformers
//! - **resolver**: metadata → relationship → leaf graph walk
//! - **handler**: event processing into `DataSubmission` records
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parcel_indexer::{
//!     EffectCache, GatewayClient, GatewayConfig, GatewayEndpoint, MemoryEntityStore,
//!     RelationshipResolver, RetryConfig, RetryEngine,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new(vec![GatewayEndpoint::new("https://ipfs.io/ipfs")])?;
//! let engine = RetryEngine::new(Arc::new(GatewayClient::new(config)?), RetryConfig::default());
//! let resolver = RelationshipResolver::new(
//!     Arc::new(engine),
//!     Arc::new(EffectCache::new()),
//!     Arc::new(MemoryEntityStore::new()),
//! );
//!
//! let root = parcel_indexer::encode_content_identifier(
//!     "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
//! )?;
//! let metadata = resolver.fetch_metadata(&root).await?;
//! let result = resolver.resolve(&metadata, &root).await;
//! println!("{}", serde_json::to_string(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cid;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod logging;
pub mod resolver;
pub mod store;
pub mod types;
pub mod validate;

pub use cache::{EffectCache, EffectKey};
pub use cid::{encode_content_identifier, ContentIdentifier};
pub use config::{Args, GatewayConfig, GatewayEndpoint, RetryConfig};
pub use error::{ResolverError, Result};
pub use gateway::{DocumentFetcher, FetchOutcome, GatewayClient, RetryEngine, RetryPolicy};
pub use handler::EventProcessor;
pub use resolver::{RelationshipResolver, ResolverOptions, ResolverStats};
pub use store::{EntityStore, MemoryEntityStore};
pub use types::*;
