//! Scripted gateway fetcher for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::client::{DocumentFetcher, FetchOutcome};
use crate::cid::ContentIdentifier;
use crate::config::GatewayEndpoint;

/// Replays a fixed outcome sequence per endpoint, repeating the last one.
///
/// Per-identifier scripts take precedence over the per-endpoint ones so
/// resolver tests can script each document separately.
pub struct ScriptedFetcher {
    endpoints: Vec<GatewayEndpoint>,
    scripts: Mutex<Vec<VecDeque<FetchOutcome>>>,
    by_cid: Mutex<HashMap<ContentIdentifier, VecDeque<FetchOutcome>>>,
    calls: Mutex<Vec<(usize, ContentIdentifier, Instant)>>,
}

impl ScriptedFetcher {
    pub fn new(scripts: Vec<Vec<FetchOutcome>>) -> Self {
        let endpoints = (0..scripts.len().max(1))
            .map(|i| GatewayEndpoint::new(format!("https://gw{}.test/ipfs", i)))
            .collect();
        Self {
            endpoints,
            scripts: Mutex::new(scripts.into_iter().map(VecDeque::from).collect()),
            by_cid: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Single endpoint, outcomes scripted per identifier
    pub fn per_document() -> Self {
        Self::new(vec![vec![FetchOutcome::Status(404)]])
    }

    pub fn script(&self, cid: &ContentIdentifier, outcomes: Vec<FetchOutcome>) {
        self.by_cid
            .lock()
            .unwrap()
            .insert(cid.clone(), VecDeque::from(outcomes));
    }

    /// Calls made against endpoint `index`
    pub fn calls(&self, index: usize) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _, _)| *i == index)
            .count()
    }

    /// Calls made for one identifier, across all endpoints
    pub fn calls_for(&self, cid: &ContentIdentifier) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c, _)| c == cid)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, _, t)| *t).collect()
    }
}

fn next(queue: &mut VecDeque<FetchOutcome>) -> Option<FetchOutcome> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl DocumentFetcher for ScriptedFetcher {
    fn endpoints(&self) -> &[GatewayEndpoint] {
        &self.endpoints
    }

    async fn fetch(&self, cid: &ContentIdentifier, endpoint: &GatewayEndpoint) -> FetchOutcome {
        let index = self
            .endpoints
            .iter()
            .position(|e| e == endpoint)
            .unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((index, cid.clone(), Instant::now()));

        tokio::task::yield_now().await;

        if let Some(queue) = self.by_cid.lock().unwrap().get_mut(cid) {
            if let Some(outcome) = next(queue) {
                return outcome;
            }
        }

        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .get_mut(index)
            .and_then(next)
            .unwrap_or(FetchOutcome::Status(404))
    }
}

pub fn relationship_json(from: Option<&ContentIdentifier>, to: &ContentIdentifier) -> Value {
    match from {
        Some(from) => json!({ "from": { "/": from.to_string() }, "to": { "/": to.to_string() } }),
        None => json!({ "to": { "/": to.to_string() } }),
    }
}
