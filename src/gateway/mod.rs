//! IPFS gateway access
//!
//! - `client`: single-shot HTTP fetch against one gateway
//! - `retry`: infinite and bounded retry policies over the gateway list

pub mod client;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DocumentFetcher, FetchOutcome, GatewayClient, TransportErrorKind};
pub use retry::{OutcomeClass, RetryEngine, RetryPolicy};
