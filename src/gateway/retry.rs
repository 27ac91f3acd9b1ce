//! Retry policies over the ordered gateway list
//!
//! ## Policies
//!
//! - **Infinite**: every failure moves on to the next gateway immediately.
//!   After a full failed pass the engine sleeps `cycle_delay` and starts over,
//!   with no attempt ceiling. Used for documents that referenced on-chain
//!   events guarantee will eventually exist.
//! - **Limited**: server errors and rejected payloads are retried on the same
//!   gateway with exponential backoff up to `max_attempts`, then the next
//!   gateway is tried. Outcomes in the indefinite class (timeouts, connection
//!   failures, 429/502/504) still cycle without a ceiling. Once every gateway
//!   has exhausted its attempts the call fails with `ResolutionUnavailable`.
//!
//! Both policies run the caller's validator before accepting a payload. A
//! rejected payload is a failed attempt, never a crash.
//!
//! The only way to stop an infinite loop is the cancellation token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::client::{DocumentFetcher, FetchOutcome, TransportErrorKind};
use crate::cid::ContentIdentifier;
use crate::config::{GatewayEndpoint, RetryConfig};
use crate::error::{ResolverError, Result};

/// Which retry policy drives a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryPolicy {
    Infinite,
    Limited,
}

/// Classification of a single fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeClass<T> {
    /// Fetched and accepted by the validator
    Success(T),
    /// Transient: timeouts, connection failures, 429, 502, 504
    RetryIndefinitely(String),
    /// Server error or rejected payload: counts against the attempt ceiling
    RetryLimited(String),
    /// Semantic rejection by the gateway (4xx)
    Fatal(String),
}

impl<T> OutcomeClass<T> {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeClass::Success(_) => "success",
            OutcomeClass::RetryIndefinitely(_) => "retriable_indefinitely",
            OutcomeClass::RetryLimited(_) => "retriable_limited",
            OutcomeClass::Fatal(_) => "fatal",
        }
    }
}

/// HTTP statuses that belong to the indefinite class
pub fn is_indefinite_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 504)
}

/// Classify one fetch outcome, running `validate` on fetched payloads.
pub fn classify<T, F>(outcome: FetchOutcome, validate: F) -> OutcomeClass<T>
where
    F: FnOnce(&Value) -> Result<T>,
{
    match outcome {
        FetchOutcome::Document(body) => match validate(&body) {
            Ok(record) => OutcomeClass::Success(record),
            Err(e) => OutcomeClass::RetryLimited(e.to_string()),
        },
        FetchOutcome::Status(status) if is_indefinite_status(status) => {
            OutcomeClass::RetryIndefinitely(format!("HTTP {}", status))
        }
        FetchOutcome::Status(status) if status >= 500 => {
            OutcomeClass::RetryLimited(format!("HTTP {}", status))
        }
        FetchOutcome::Status(status) => OutcomeClass::Fatal(format!("HTTP {}", status)),
        FetchOutcome::Transport {
            kind: TransportErrorKind::Decode,
            message,
        } => OutcomeClass::RetryLimited(format!("malformed body: {}", message)),
        FetchOutcome::Transport { message, .. } => OutcomeClass::RetryIndefinitely(message),
    }
}

/// Backoff before the next bounded attempt (`attempt` is 1-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// Drives fetches through a retry policy
pub struct RetryEngine {
    fetcher: Arc<dyn DocumentFetcher>,
    config: RetryConfig,
    cancel: CancellationToken,
    attempts: AtomicU64,
}

impl RetryEngine {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, config: RetryConfig) -> Self {
        Self {
            fetcher,
            config,
            cancel: CancellationToken::new(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Stop retry loops when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Total gateway requests issued so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Fetch and validate `cid` under `policy`.
    pub async fn fetch<T, F>(
        &self,
        policy: RetryPolicy,
        cid: &ContentIdentifier,
        validate: F,
    ) -> Result<T>
    where
        F: Fn(&Value) -> Result<T>,
    {
        match policy {
            RetryPolicy::Infinite => self.fetch_infinite(cid, validate).await,
            RetryPolicy::Limited => self.fetch_limited(cid, validate).await,
        }
    }

    async fn fetch_infinite<T, F>(&self, cid: &ContentIdentifier, validate: F) -> Result<T>
    where
        F: Fn(&Value) -> Result<T>,
    {
        let endpoints = self.fetcher.endpoints();
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            for endpoint in endpoints {
                let outcome = self.attempt(cid, endpoint).await?;
                match classify(outcome, &validate) {
                    OutcomeClass::Success(record) => return Ok(record),
                    failure => log_failure(cid, endpoint, &failure, cycle),
                }
            }

            warn!(
                cid = %cid,
                cycle,
                delay_ms = self.config.cycle_delay.as_millis() as u64,
                "All gateways failed, restarting cycle"
            );
            self.pause(self.config.cycle_delay).await?;
        }
    }

    async fn fetch_limited<T, F>(&self, cid: &ContentIdentifier, validate: F) -> Result<T>
    where
        F: Fn(&Value) -> Result<T>,
    {
        let endpoints = self.fetcher.endpoints();
        let mut attempts = vec![0u32; endpoints.len()];
        let mut exhausted = vec![false; endpoints.len()];
        let mut total: u32 = 0;
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;

            for (index, endpoint) in endpoints.iter().enumerate() {
                while !exhausted[index] {
                    let outcome = self.attempt(cid, endpoint).await?;
                    total += 1;

                    let class = classify(outcome, &validate);
                    let reason = match class {
                        OutcomeClass::Success(record) => return Ok(record),
                        OutcomeClass::RetryIndefinitely(_) => {
                            log_failure(cid, endpoint, &class, cycle);
                            break;
                        }
                        OutcomeClass::Fatal(_) => {
                            log_failure(cid, endpoint, &class, cycle);
                            exhausted[index] = true;
                            break;
                        }
                        OutcomeClass::RetryLimited(ref reason) => reason.clone(),
                    };

                    attempts[index] += 1;
                    let delay = backoff_delay(self.config.base_delay, attempts[index]);
                    warn!(
                        cid = %cid,
                        endpoint = %endpoint.base_url,
                        class = class.label(),
                        attempt = attempts[index],
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Gateway attempt failed, backing off"
                    );
                    self.pause(delay).await?;

                    if attempts[index] >= self.config.max_attempts {
                        exhausted[index] = true;
                    }
                }
            }

            if exhausted.iter().all(|done| *done) {
                error!(
                    cid = %cid,
                    attempts = total,
                    class = "resolution_unavailable",
                    "All gateways exhausted"
                );
                return Err(ResolverError::ResolutionUnavailable {
                    cid: cid.to_string(),
                    attempts: total,
                });
            }

            warn!(
                cid = %cid,
                cycle,
                delay_ms = self.config.cycle_delay.as_millis() as u64,
                "Gateways transiently unavailable, restarting cycle"
            );
            self.pause(self.config.cycle_delay).await?;
        }
    }

    async fn attempt(
        &self,
        cid: &ContentIdentifier,
        endpoint: &GatewayEndpoint,
    ) -> Result<FetchOutcome> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        debug!(cid = %cid, endpoint = %endpoint.base_url, "Fetching from gateway");

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ResolverError::Cancelled),
            outcome = self.fetcher.fetch(cid, endpoint) => Ok(outcome),
        }
    }

    async fn pause(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ResolverError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

fn log_failure<T>(
    cid: &ContentIdentifier,
    endpoint: &GatewayEndpoint,
    class: &OutcomeClass<T>,
    cycle: u64,
) {
    let reason = match class {
        OutcomeClass::Success(_) => return,
        OutcomeClass::RetryIndefinitely(r)
        | OutcomeClass::RetryLimited(r)
        | OutcomeClass::Fatal(r) => r,
    };
    warn!(
        cid = %cid,
        endpoint = %endpoint.base_url,
        class = class.label(),
        cycle,
        error = %reason,
        "Gateway fetch failed, trying next gateway"
    );
}
