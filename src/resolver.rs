//! Relationship graph resolver
//!
//! Walks the fixed two-level link graph of a data submission:
//!
//! ```text
//! Metadata ──property_has_address──▶ Relationship ──from──▶ Property leaf
//!                                                 └──to───▶ Address leaf
//! ```
//!
//! ## Resolution Flow
//!
//! 1. Read the `property_has_address` link from the metadata document
//! 2. Fetch the relationship record with the bounded retry policy
//! 3. Fetch both leaves concurrently with the leaf policy (infinite by default)
//! 4. Hand each resolved leaf to the entity store under its own identifier
//! 5. Return a `ResolutionResult` with whichever leaves resolved
//!
//! Failures never cross the resolver boundary. A branch that cannot be
//! resolved is logged and left out of the result, and sibling fetches that are
//! already in flight run to completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, EffectCache, EffectKey};
use crate::cid::ContentIdentifier;
use crate::error::{ResolverError, Result};
use crate::gateway::{RetryEngine, RetryPolicy};
use crate::store::EntityStore;
use crate::types::{
    AddressRecord, MetadataRecord, PropertyRecord, RelationKind, RelationshipRecord,
    ResolutionResult,
};
use crate::validate::{validate_document, Document, DocumentKind};

/// Retry policy per stage of the walk
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Policy for metadata roots
    pub metadata_policy: RetryPolicy,
    /// Policy for the relationship lookup behind a graph edge
    pub relationship_policy: RetryPolicy,
    /// Policy for address and property leaves
    pub leaf_policy: RetryPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            metadata_policy: RetryPolicy::Infinite,
            relationship_policy: RetryPolicy::Limited,
            leaf_policy: RetryPolicy::Infinite,
        }
    }
}

#[derive(Default)]
struct Counters {
    resolutions: AtomicU64,
    leaves_resolved: AtomicU64,
    leaves_failed: AtomicU64,
    branches_unavailable: AtomicU64,
}

/// Public statistics
#[derive(Debug, Clone, Serialize)]
pub struct ResolverStats {
    pub resolutions: u64,
    pub leaves_resolved: u64,
    pub leaves_failed: u64,
    pub branches_unavailable: u64,
    pub gateway_requests: u64,
    pub cache: CacheStats,
}

/// Resolves metadata roots into address and property records
pub struct RelationshipResolver {
    engine: Arc<RetryEngine>,
    cache: Arc<EffectCache>,
    store: Arc<dyn EntityStore>,
    options: ResolverOptions,
    counters: Counters,
}

impl RelationshipResolver {
    pub fn new(
        engine: Arc<RetryEngine>,
        cache: Arc<EffectCache>,
        store: Arc<dyn EntityStore>,
    ) -> Self {
        Self::with_options(engine, cache, store, ResolverOptions::default())
    }

    pub fn with_options(
        engine: Arc<RetryEngine>,
        cache: Arc<EffectCache>,
        store: Arc<dyn EntityStore>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            engine,
            cache,
            store,
            options,
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Resolve the address and property reachable from `metadata`.
    pub async fn resolve(
        &self,
        metadata: &MetadataRecord,
        root: &ContentIdentifier,
    ) -> ResolutionResult {
        self.counters.resolutions.fetch_add(1, Ordering::Relaxed);

        let Some(relationship_cid) = metadata
            .links(RelationKind::PropertyHasAddress)
            .into_iter()
            .next()
            .cloned()
        else {
            info!(root = %root, label = %metadata.label, "No address relation in metadata");
            return ResolutionResult::default();
        };

        debug!(
            root = %root,
            relationship = %relationship_cid,
            relations = metadata.relationships.len(),
            "Resolving property_has_address"
        );

        let relationship = match self.fetch_relationship(&relationship_cid).await {
            Ok(record) => record,
            Err(e) => {
                self.counters.branches_unavailable.fetch_add(1, Ordering::Relaxed);
                warn!(
                    root = %root,
                    cid = %relationship_cid,
                    error = %e,
                    "Relationship unavailable, skipping address and property"
                );
                return ResolutionResult::default();
            }
        };

        let address_cid = relationship.to.target.clone();
        let property_cid = relationship.from.as_ref().map(|link| link.target.clone());

        let (address, property) = tokio::join!(
            self.resolve_address(&address_cid),
            async {
                match property_cid {
                    Some(ref cid) => self.resolve_property(cid).await,
                    None => None,
                }
            }
        );

        let mut result = ResolutionResult::default();
        if address.is_some() {
            result.address_id = Some(address_cid);
        }
        if let Some(property) = property {
            result.property_data_id = property_cid;
            result.parcel_identifier = property.parcel_identifier;
        }

        info!(
            root = %root,
            address = result.address_id.is_some(),
            property = result.property_data_id.is_some(),
            parcel = ?result.parcel_identifier,
            "Resolution complete"
        );
        result
    }

    async fn resolve_address(&self, cid: &ContentIdentifier) -> Option<AddressRecord> {
        match self.fetch_address(cid).await {
            Ok(record) => {
                if self.store.get_address(cid).await.is_none() {
                    self.store.set_address(cid, record.clone()).await;
                }
                self.counters.leaves_resolved.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            Err(e) => {
                self.counters.leaves_failed.fetch_add(1, Ordering::Relaxed);
                warn!(cid = %cid, kind = "address", error = %e, "Address leaf unavailable");
                None
            }
        }
    }

    async fn resolve_property(&self, cid: &ContentIdentifier) -> Option<PropertyRecord> {
        match self.fetch_property(cid).await {
            Ok(record) => {
                if self.store.get_property(cid).await.is_none() {
                    self.store.set_property(cid, record.clone()).await;
                }
                self.counters.leaves_resolved.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            Err(e) => {
                self.counters.leaves_failed.fetch_add(1, Ordering::Relaxed);
                warn!(cid = %cid, kind = "property", error = %e, "Property leaf unavailable");
                None
            }
        }
    }

    // ==================== Cached fetches ====================

    /// Fetch, validate and memoize a document.
    pub async fn fetch_document(
        &self,
        kind: DocumentKind,
        policy: RetryPolicy,
        cid: &ContentIdentifier,
    ) -> Result<Document> {
        let key = EffectKey::new(kind, policy, cid.clone());
        self.cache
            .cached(key, || {
                self.engine
                    .fetch(policy, cid, move |value: &Value| validate_document(kind, value))
            })
            .await
    }

    pub async fn fetch_metadata(&self, cid: &ContentIdentifier) -> Result<MetadataRecord> {
        match self
            .fetch_document(DocumentKind::Metadata, self.options.metadata_policy, cid)
            .await?
        {
            Document::Metadata(record) => Ok(record),
            other => Err(unexpected(DocumentKind::Metadata, &other)),
        }
    }

    pub async fn fetch_relationship(&self, cid: &ContentIdentifier) -> Result<RelationshipRecord> {
        match self
            .fetch_document(DocumentKind::Relationship, self.options.relationship_policy, cid)
            .await?
        {
            Document::Relationship(record) => Ok(record),
            other => Err(unexpected(DocumentKind::Relationship, &other)),
        }
    }

    pub async fn fetch_address(&self, cid: &ContentIdentifier) -> Result<AddressRecord> {
        match self
            .fetch_document(DocumentKind::Address, self.options.leaf_policy, cid)
            .await?
        {
            Document::Address(record) => Ok(record),
            other => Err(unexpected(DocumentKind::Address, &other)),
        }
    }

    pub async fn fetch_property(&self, cid: &ContentIdentifier) -> Result<PropertyRecord> {
        match self
            .fetch_document(DocumentKind::Property, self.options.leaf_policy, cid)
            .await?
        {
            Document::Property(record) => Ok(record),
            other => Err(unexpected(DocumentKind::Property, &other)),
        }
    }

    /// Get resolver statistics
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            resolutions: self.counters.resolutions.load(Ordering::Relaxed),
            leaves_resolved: self.counters.leaves_resolved.load(Ordering::Relaxed),
            leaves_failed: self.counters.leaves_failed.load(Ordering::Relaxed),
            branches_unavailable: self.counters.branches_unavailable.load(Ordering::Relaxed),
            gateway_requests: self.engine.attempts(),
            cache: self.cache.stats(),
        }
    }
}

fn unexpected(expected: DocumentKind, got: &Document) -> ResolverError {
    ResolverError::schema(
        expected.as_str(),
        format!("cache returned a {} document", got.kind()),
    )
}
