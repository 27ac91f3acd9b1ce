//! End-to-end resolution against HTTP gateways
//!
//! Stands up wiremock gateways and drives the resolver through the real
//! reqwest client:
//! - gateway fallback and token query parameters
//! - effect cache de-duplication
//! - bounded relationship retries
//! - partial results when one leaf is unavailable

use std::sync::Arc;
use std::time::Duration;

use parcel_indexer::{
    ContentIdentifier, EffectCache, EntityStore, GatewayClient, GatewayConfig, GatewayEndpoint,
    MemoryEntityStore, MetadataRecord, RelationshipResolver, ResolverOptions, RetryConfig,
    RetryEngine, RetryPolicy,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Helpers
// =============================================================================

fn cid(seed: u8) -> ContentIdentifier {
    ContentIdentifier::from_digest(&[seed; 32]).unwrap()
}

fn fast_retries() -> RetryConfig {
    RetryConfig {
        cycle_delay: Duration::from_millis(20),
        base_delay: Duration::from_millis(5),
        max_attempts: 3,
    }
}

fn resolver_for(
    endpoints: Vec<GatewayEndpoint>,
    options: ResolverOptions,
) -> (RelationshipResolver, Arc<MemoryEntityStore>) {
    let config = GatewayConfig::new(endpoints).unwrap();
    let client = GatewayClient::new(config).unwrap();
    let engine = RetryEngine::new(Arc::new(client), fast_retries());
    let store = Arc::new(MemoryEntityStore::new());
    let resolver = RelationshipResolver::with_options(
        Arc::new(engine),
        Arc::new(EffectCache::new()),
        store.clone(),
        options,
    );
    (resolver, store)
}

fn gateway(server: &MockServer) -> GatewayEndpoint {
    GatewayEndpoint::new(format!("{}/ipfs", server.uri()))
}

async fn serve(server: &MockServer, cid: &ContentIdentifier, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}", cid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

async fn fail(server: &MockServer, cid: &ContentIdentifier, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}", cid)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

fn metadata(relationship: &ContentIdentifier) -> MetadataRecord {
    serde_json::from_value(json!({
        "label": "County",
        "relationships": { "property_has_address": { "/": relationship.to_string() } }
    }))
    .unwrap()
}

fn relationship(from: &ContentIdentifier, to: &ContentIdentifier) -> Value {
    json!({ "from": { "/": from.to_string() }, "to": { "/": to.to_string() } })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_full_resolution_with_cache() {
    let server = MockServer::start().await;
    let (root, rel, property, address) = (cid(1), cid(2), cid(3), cid(4));

    serve(&server, &rel, relationship(&property, &address), 1).await;
    serve(
        &server,
        &address,
        json!({ "street_number": "1450", "street_name": "Brickell", "city_name": "Miami" }),
        1,
    )
    .await;
    serve(&server, &property, json!({ "parcel_identifier": "01-4139-048-0001" }), 1).await;

    let (resolver, store) = resolver_for(vec![gateway(&server)], ResolverOptions::default());

    let first = resolver.resolve(&metadata(&rel), &root).await;
    let second = resolver.resolve(&metadata(&rel), &root).await;

    assert_eq!(first, second);
    assert_eq!(first.address_id, Some(address.clone()));
    assert_eq!(first.property_data_id, Some(property.clone()));
    assert_eq!(first.parcel_identifier.as_deref(), Some("01-4139-048-0001"));

    assert_eq!(
        store.get_address(&address).await.unwrap().city_name.as_deref(),
        Some("Miami")
    );
    assert_eq!(store.writes(), 2);
    assert_eq!(resolver.stats().cache.executions, 3);
}

#[tokio::test]
async fn test_falls_back_to_second_gateway_with_token() {
    let flaky = MockServer::start().await;
    let healthy = MockServer::start().await;
    let (root, rel, property, address) = (cid(1), cid(2), cid(3), cid(4));

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&flaky)
        .await;

    for (id, body) in [
        (&rel, relationship(&property, &address)),
        (&address, json!({ "city_name": "Tampa" })),
        (&property, json!({ "parcel_identifier": "A-1" })),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/ipfs/{}", id)))
            .and(query_param("pinataGatewayToken", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&healthy)
            .await;
    }

    let (resolver, _store) = resolver_for(
        vec![gateway(&flaky), gateway(&healthy).with_token("secret")],
        ResolverOptions::default(),
    );

    let result = resolver.resolve(&metadata(&rel), &root).await;

    assert_eq!(result.address_id, Some(address));
    assert_eq!(result.parcel_identifier.as_deref(), Some("A-1"));
}

#[tokio::test]
async fn test_relationship_server_errors_exhaust_bounded_retries() {
    let server = MockServer::start().await;
    let (root, rel) = (cid(1), cid(2));

    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}", rel)))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let (resolver, store) = resolver_for(vec![gateway(&server)], ResolverOptions::default());

    let result = resolver.resolve(&metadata(&rel), &root).await;

    assert!(result.is_empty());
    assert_eq!(store.writes(), 0);
    assert_eq!(resolver.stats().branches_unavailable, 1);
}

#[tokio::test]
async fn test_relationship_recovers_after_bad_gateway() {
    let server = MockServer::start().await;
    let (root, rel, property, address) = (cid(1), cid(2), cid(3), cid(4));

    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}", rel)))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    serve(&server, &rel, relationship(&property, &address), 1).await;
    serve(&server, &address, json!({ "city_name": "Orlando" }), 1).await;
    serve(&server, &property, json!({}), 1).await;

    let (resolver, _store) = resolver_for(vec![gateway(&server)], ResolverOptions::default());

    let result = resolver.resolve(&metadata(&rel), &root).await;

    assert_eq!(result.address_id, Some(address));
    assert_eq!(result.property_data_id, Some(property));
    assert!(result.parcel_identifier.is_none());
}

#[tokio::test]
async fn test_failed_address_leaves_property_intact() {
    let server = MockServer::start().await;
    let (root, rel, property, address) = (cid(1), cid(2), cid(3), cid(4));

    serve(&server, &rel, relationship(&property, &address), 1).await;
    fail(&server, &address, 500).await;
    serve(&server, &property, json!({ "parcel_identifier": "P-9" }), 1).await;

    let options = ResolverOptions {
        leaf_policy: RetryPolicy::Limited,
        ..Default::default()
    };
    let (resolver, store) = resolver_for(vec![gateway(&server)], options);

    let result = resolver.resolve(&metadata(&rel), &root).await;

    assert!(result.address_id.is_none());
    assert_eq!(result.property_data_id, Some(property.clone()));
    assert_eq!(result.parcel_identifier.as_deref(), Some("P-9"));
    assert!(store.get_property(&property).await.is_some());
    assert!(store.get_address(&address).await.is_none());
}

#[tokio::test]
async fn test_metadata_without_address_relation_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let (resolver, _store) = resolver_for(vec![gateway(&server)], ResolverOptions::default());
    let metadata: MetadataRecord = serde_json::from_value(json!({
        "label": "Seed",
        "relationships": { "property_has_file": [{ "/": cid(7).to_string() }] }
    }))
    .unwrap();

    let result = resolver.resolve(&metadata, &cid(1)).await;
    assert!(result.is_empty());
}
