//! parcel-indexer - property data resolution over IPFS gateways

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use parcel_indexer::{
    config::{Args, Command},
    logging, ContentIdentifier, DataSubmittedEvent, EffectCache, EventProcessor, GatewayClient,
    MemoryEntityStore, RelationshipResolver, RetryEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    let command = args.command.clone();
    if let Command::Cid { hash } = command {
        let cid = parcel_indexer::encode_content_identifier(&hash)?;
        println!("{}", cid);
        return Ok(());
    }

    let resolver = build_resolver(&args);

    match args.command {
        Command::Cid { .. } => {}
        Command::Resolve { cid } => {
            let root = ContentIdentifier::parse(&cid)?;
            let metadata = resolver.fetch_metadata(&root).await?;
            let result = resolver.resolve(&metadata, &root).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Process {
            hash,
            property_hash,
            data_group_hash,
            submitter,
            block,
            timestamp,
            log_index,
            tx,
        } => {
            let event = DataSubmittedEvent {
                submitter,
                property_hash,
                data_group_hash,
                data_hash: hash,
                block_number: block,
                block_timestamp: timestamp,
                log_index,
                transaction_hash: tx,
            };
            let processor = EventProcessor::new(resolver.clone());
            let submission = processor.handle(&event).await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }
    }

    info!(stats = ?resolver.stats(), "Done");
    Ok(())
}

/// Wire gateway client, retry engine, cache and store into a resolver.
///
/// Exits the process when no gateway is configured.
fn build_resolver(args: &Args) -> Arc<RelationshipResolver> {
    let gateway_config = match args.gateway_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {} (set GATEWAY_URLS)", e);
            std::process::exit(1);
        }
    };

    info!("Gateways: {}", gateway_config.endpoints().len());
    for (i, endpoint) in gateway_config.endpoints().iter().enumerate() {
        info!(
            "  gateway-{}: {}{}",
            i,
            endpoint.base_url,
            if endpoint.token.is_some() { " (token)" } else { "" }
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight resolution");
            ctrl_c.cancel();
        }
    });

    let client = match GatewayClient::new(gateway_config) {
        Ok(client) => client,
        Err(e) => {
            error!("Gateway client error: {}", e);
            std::process::exit(1);
        }
    };
    let engine = RetryEngine::new(Arc::new(client), args.retry_config()).with_cancellation(cancel);

    Arc::new(RelationshipResolver::new(
        Arc::new(engine),
        Arc::new(EffectCache::new()),
        Arc::new(MemoryEntityStore::new()),
    ))
}
