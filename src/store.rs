//! Entity store interface
//!
//! The resolver hands every resolved leaf to an `EntityStore`, keyed by the
//! leaf's own content identifier. Storage itself belongs to the caller; the
//! in-memory implementation here backs the CLI and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cid::ContentIdentifier;
use crate::types::{AddressRecord, DataSubmission, PropertyRecord};

/// Persistence for derived records
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_address(&self, id: &ContentIdentifier) -> Option<AddressRecord>;
    async fn set_address(&self, id: &ContentIdentifier, record: AddressRecord);

    async fn get_property(&self, id: &ContentIdentifier) -> Option<PropertyRecord>;
    async fn set_property(&self, id: &ContentIdentifier, record: PropertyRecord);

    async fn get_submission(&self, id: &str) -> Option<DataSubmission>;
    async fn set_submission(&self, record: DataSubmission);
}

/// In-memory entity store
#[derive(Default)]
pub struct MemoryEntityStore {
    addresses: DashMap<ContentIdentifier, AddressRecord>,
    properties: DashMap<ContentIdentifier, PropertyRecord>,
    submissions: DashMap<String, DataSubmission>,
    writes: AtomicU64,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_*` calls received
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get_address(&self, id: &ContentIdentifier) -> Option<AddressRecord> {
        self.addresses.get(id).map(|r| r.value().clone())
    }

    async fn set_address(&self, id: &ContentIdentifier, record: AddressRecord) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.addresses.insert(id.clone(), record);
    }

    async fn get_property(&self, id: &ContentIdentifier) -> Option<PropertyRecord> {
        self.properties.get(id).map(|r| r.value().clone())
    }

    async fn set_property(&self, id: &ContentIdentifier, record: PropertyRecord) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.properties.insert(id.clone(), record);
    }

    async fn get_submission(&self, id: &str) -> Option<DataSubmission> {
        self.submissions.get(id).map(|r| r.value().clone())
    }

    async fn set_submission(&self, record: DataSubmission) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.submissions.insert(record.id.clone(), record);
    }
}
