//! Off-chain metadata reconciliation.
//!
//! Tender records on the ledger only carry a content address. The
//! [`MetadataCache`] fetches the JSON document behind it and pairs it with
//! the on-chain record for display. Documents are descriptive only; nothing
//! in them is used for authorization or amounts.
//!
//! Entries are keyed by content address and kept for the life of the cache.
//! Content at an address is immutable, so there is no invalidation. Only
//! successful fetches are memoised; an absent document is fetched again on
//! the next resolve. Callers that were already waiting on a fetch share its
//! failure instead of issuing their own.

pub mod sqlite;
pub mod store;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ContentHash, Tender};

pub use store::ContentStore;

/// A fetched off-chain document, kept exactly as published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OffChainMetadata(pub Value);

impl OffChainMetadata {
    pub fn title(&self) -> Option<&str> {
        self.text(&["title", "name"])
    }

    pub fn description(&self) -> Option<&str> {
        self.text(&["description"])
    }

    /// Budget as written by the publisher; free-form, never used for payouts.
    pub fn budget(&self) -> Option<&Value> {
        self.0.get("budget")
    }

    fn text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.0.get(*k).and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum MetadataState {
    /// Not fetched yet; render a loading placeholder.
    Pending,
    /// Fetch produced nothing; render an unavailable placeholder.
    Unavailable,
    Ready(OffChainMetadata),
}

/// An on-chain tender paired with whatever off-chain content is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTender {
    #[serde(flatten)]
    pub tender: Tender,
    pub metadata: MetadataState,
}

#[derive(Default)]
struct Slot {
    doc: OnceCell<OffChainMetadata>,
    /// Completed failed fetches; a waiter that sees it move gives up.
    failures: AtomicU64,
}

type Entry = Arc<Slot>;

pub struct MetadataCache {
    store: Arc<dyn ContentStore>,
    entries: Mutex<HashMap<ContentHash, Entry>>,
    retry_delay: Duration,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn ContentStore>, retry_delay: Duration) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            retry_delay,
        }
    }

    fn entry(&self, hash: &ContentHash) -> Entry {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.entry(hash.clone()).or_default().clone()
    }

    /// Non-blocking view of what is cached for `hash`.
    pub fn peek(&self, hash: &ContentHash) -> MetadataState {
        if hash.is_empty() {
            return MetadataState::Unavailable;
        }
        match self.entry(hash).doc.get() {
            Some(doc) => MetadataState::Ready(doc.clone()),
            None => MetadataState::Pending,
        }
    }

    /// Fetch (at most once concurrently per address) and parse `hash`.
    pub async fn fetch(&self, hash: &ContentHash) -> Option<OffChainMetadata> {
        if hash.is_empty() {
            return None;
        }
        let entry = self.entry(hash);
        if let Some(doc) = entry.doc.get() {
            debug!(%hash, "Metadata cache hit");
            return Some(doc.clone());
        }
        let seen = entry.failures.load(Ordering::Acquire);
        entry
            .doc
            .get_or_try_init(|| async {
                if entry.failures.load(Ordering::Acquire) != seen {
                    return Err(());
                }
                let loaded = self.load(hash).await;
                if loaded.is_err() {
                    entry.failures.fetch_add(1, Ordering::AcqRel);
                }
                loaded
            })
            .await
            .ok()
            .cloned()
    }

    async fn load(&self, hash: &ContentHash) -> std::result::Result<OffChainMetadata, ()> {
        debug!(%hash, "Metadata cache miss, fetching");
        let fetched = match self.store.fetch(hash).await {
            Err(e) if e.is_transient() || matches!(e, crate::errors::TenderError::Http(_)) => {
                warn!(%hash, "Metadata fetch failed, retrying once: {e}");
                tokio::time::sleep(self.retry_delay).await;
                self.store.fetch(hash).await
            }
            other => other,
        };

        let bytes = match fetched {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(%hash, "Metadata not found");
                return Err(());
            }
            Err(e) => {
                warn!(%hash, "Metadata unavailable: {e}");
                return Err(());
            }
        };

        serde_json::from_slice::<Value>(&bytes)
            .map(OffChainMetadata)
            .map_err(|e| warn!(%hash, "Metadata is not valid JSON: {e}"))
    }

    pub async fn resolve(&self, tender: Tender) -> EnrichedTender {
        let metadata = match self.fetch(&tender.metadata_hash).await {
            Some(doc) => MetadataState::Ready(doc),
            None => MetadataState::Unavailable,
        };
        EnrichedTender { tender, metadata }
    }

    /// Resolve many tenders concurrently; order of the input is kept.
    pub async fn resolve_all(&self, tenders: Vec<Tender>) -> Vec<EnrichedTender> {
        futures::future::join_all(tenders.into_iter().map(|t| self.resolve(t))).await
    }

    /// Pair `tender` with cached content without fetching.
    pub fn enrich_cached(&self, tender: Tender) -> EnrichedTender {
        let metadata = self.peek(&tender.metadata_hash);
        EnrichedTender { tender, metadata }
    }

    /// Publish `doc` and seed the cache with it.
    pub async fn publish(&self, doc: &Value, name: &str) -> Result<ContentHash> {
        let bytes = serde_json::to_vec(doc)?;
        let hash = self.store.store(bytes, name).await?;
        // Seeding fails only if another task filled the entry first.
        let _ = self.entry(&hash).doc.set(OffChainMetadata(doc.clone()));
        Ok(hash)
    }
}
