//! Effect cache for gateway documents
//!
//! Memoizes validated documents by `(kind, policy, cid)` for the lifetime of
//! the process. Concurrent requests for the same key join the in-flight fetch
//! instead of issuing their own, and terminal failures such as
//! `ResolutionUnavailable` are stored like successes so a bounded lookup is not
//! silently retried on the next hit. Cancellation is never stored.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::cid::ContentIdentifier;
use crate::error::{ResolverError, Result};
use crate::gateway::RetryPolicy;
use crate::validate::{Document, DocumentKind};

/// Cache key: which operation ran on which identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectKey {
    pub kind: DocumentKind,
    pub policy: RetryPolicy,
    pub cid: ContentIdentifier,
}

impl EffectKey {
    pub fn new(kind: DocumentKind, policy: RetryPolicy, cid: ContentIdentifier) -> Self {
        Self { kind, policy, cid }
    }
}

type Slot = Arc<OnceCell<Result<Document>>>;

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub requests: u64,
    pub executions: u64,
}

/// Process-wide memo of fetch-and-validate effects
#[derive(Default)]
pub struct EffectCache {
    entries: DashMap<EffectKey, Slot>,
    requests: AtomicU64,
    executions: AtomicU64,
}

impl EffectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized result for `key`, running `effect` at most once.
    pub async fn cached<F, Fut>(&self, key: EffectKey, effect: F) -> Result<Document>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Document>>,
    {
        self.requests.fetch_add(1, Ordering::Relaxed);

        // Clone the slot out so no shard lock is held across the await.
        let slot: Slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if slot.initialized() {
            debug!(cid = %key.cid, kind = %key.kind, "Effect cache hit");
        }

        let result = slot
            .get_or_init(|| async move {
                self.executions.fetch_add(1, Ordering::Relaxed);
                effect().await
            })
            .await
            .clone();

        if matches!(result, Err(ResolverError::Cancelled)) {
            self.entries.remove_if(&key, |_, existing| Arc::ptr_eq(existing, &slot));
        }

        result
    }

    /// Previously stored result, if any
    pub fn peek(&self, key: &EffectKey) -> Option<Result<Document>> {
        self.entries.get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            requests: self.requests.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
        }
    }
}
