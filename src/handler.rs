//! DataSubmitted event processing
//!
//! Turns a decoded on-chain event into a persisted `DataSubmission`: derive
//! the content identifier from the event's data hash, fetch the metadata root
//! (infinite policy), resolve its address and property, and store the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::cid::ContentIdentifier;
use crate::error::Result;
use crate::resolver::RelationshipResolver;
use crate::types::{DataSubmission, DataSubmittedEvent};

/// Processes `DataSubmitted` events against a resolver
pub struct EventProcessor {
    resolver: Arc<RelationshipResolver>,
}

impl EventProcessor {
    pub fn new(resolver: Arc<RelationshipResolver>) -> Self {
        Self { resolver }
    }

    /// Process one event.
    ///
    /// Fails only when the event's hash is malformed or the metadata fetch is
    /// cancelled; unresolved branches show up as absent fields.
    pub async fn handle(&self, event: &DataSubmittedEvent) -> Result<DataSubmission> {
        let cid = ContentIdentifier::from_hash_hex(&event.data_hash).map_err(|e| {
            error!(
                tx = %event.transaction_hash,
                log_index = event.log_index,
                data_hash = %event.data_hash,
                error = %e,
                "Invalid data hash in event"
            );
            e
        })?;

        info!(
            cid = %cid,
            block = event.block_number,
            submitter = %event.submitter,
            "Processing data submission"
        );

        let metadata = self.resolver.fetch_metadata(&cid).await?;
        let resolution = self.resolver.resolve(&metadata, &cid).await;

        let submission = DataSubmission {
            id: event.submission_id(),
            submitter: event.submitter.to_lowercase(),
            property_hash: event.property_hash.clone(),
            data_group_hash: event.data_group_hash.clone(),
            content_identifier: cid,
            label: metadata.label,
            block_number: event.block_number,
            block_timestamp: DateTime::<Utc>::from_timestamp(event.block_timestamp, 0)
                .unwrap_or_default(),
            resolution,
        };

        self.resolver.store().set_submission(submission.clone()).await;
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EffectCache;
    use crate::config::RetryConfig;
    use crate::error::ResolverError;
    use crate::gateway::testing::{relationship_json, ScriptedFetcher};
    use crate::gateway::{FetchOutcome, RetryEngine};
    use crate::store::{EntityStore, MemoryEntityStore};
    use serde_json::json;

    fn event(data_hash: String) -> DataSubmittedEvent {
        DataSubmittedEvent {
            submitter: "0xABCDEF".to_string(),
            property_hash: "0x01".to_string(),
            data_group_hash: "0x02".to_string(),
            data_hash,
            block_number: 1200,
            block_timestamp: 1_700_000_000,
            log_index: 4,
            transaction_hash: "0xfeed".to_string(),
        }
    }

    fn processor() -> (Arc<ScriptedFetcher>, Arc<MemoryEntityStore>, EventProcessor) {
        let fetcher = Arc::new(ScriptedFetcher::per_document());
        let engine = RetryEngine::new(fetcher.clone(), RetryConfig::default());
        let store = Arc::new(MemoryEntityStore::new());
        let resolver = RelationshipResolver::new(
            Arc::new(engine),
            Arc::new(EffectCache::new()),
            store.clone(),
        );
        (fetcher, store, EventProcessor::new(Arc::new(resolver)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_is_resolved_and_stored() {
        let (fetcher, store, processor) = processor();
        let digest = [0x11u8; 32];
        let root = ContentIdentifier::from_digest(&digest).unwrap();
        let rel = ContentIdentifier::from_digest(&[0x22; 32]).unwrap();
        let property = ContentIdentifier::from_digest(&[0x33; 32]).unwrap();
        let address = ContentIdentifier::from_digest(&[0x44; 32]).unwrap();

        fetcher.script(
            &root,
            vec![FetchOutcome::Document(json!({
                "label": "County",
                "relationships": { "property_has_address": { "/": rel.to_string() } }
            }))],
        );
        fetcher.script(
            &rel,
            vec![FetchOutcome::Document(relationship_json(Some(&property), &address))],
        );
        fetcher.script(&address, vec![FetchOutcome::Document(json!({ "city_name": "Miami" }))]);
        fetcher.script(
            &property,
            vec![FetchOutcome::Document(json!({ "parcel_identifier": "30-4101" }))],
        );

        let submission = processor
            .handle(&event(format!("0x{}", hex::encode(digest))))
            .await
            .unwrap();

        assert_eq!(submission.id, "0xfeed-4");
        assert_eq!(submission.submitter, "0xabcdef");
        assert_eq!(submission.content_identifier, root);
        assert_eq!(submission.label, "County");
        assert_eq!(submission.block_timestamp.timestamp(), 1_700_000_000);
        assert_eq!(submission.resolution.parcel_identifier.as_deref(), Some("30-4101"));
        assert_eq!(submission.resolution.address_id, Some(address));

        assert_eq!(store.get_submission("0xfeed-4").await, Some(submission));
    }

    #[tokio::test]
    async fn test_malformed_hash_is_rejected() {
        let (fetcher, _store, processor) = processor();
        let result = processor.handle(&event("0x1234".to_string())).await;

        assert_eq!(
            result.unwrap_err(),
            ResolverError::InvalidHashLength { actual: 2 }
        );
        assert_eq!(fetcher.total_calls(), 0);
    }
}
