//! Long-running background task that keeps the tender board fresh.
//!
//! Each pass lists every tender, publishes it right away with whatever
//! metadata is already cached (placeholders otherwise), then resolves the
//! missing documents and publishes again. A failed pass leaves the previous
//! snapshot in place.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::metadata::EnrichedTender;
use crate::phase::unix_now;
use crate::service::{TenderService, TenderSummary};
use crate::types::NetworkId;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    tenders: Vec<EnrichedTender>,
    refreshed_at: Option<u64>,
}

/// Board as served to clients. Phases are derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub network: NetworkId,
    pub refreshed_at: Option<u64>,
    pub count: usize,
    pub tenders: Vec<TenderSummary>,
}

pub struct BoardState {
    service: Arc<TenderService>,
    network: NetworkId,
    interval: Duration,
    snapshot: RwLock<Snapshot>,
}

impl BoardState {
    pub fn new(service: Arc<TenderService>, network: NetworkId, interval: Duration) -> Self {
        Self {
            service,
            network,
            interval,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub async fn view(&self, now: u64) -> BoardView {
        let snapshot = self.snapshot.read().await;
        let tenders: Vec<TenderSummary> = snapshot
            .tenders
            .iter()
            .cloned()
            .map(|t| TenderSummary::new(t, now))
            .collect();
        BoardView {
            network: self.network,
            refreshed_at: snapshot.refreshed_at,
            count: tenders.len(),
            tenders,
        }
    }

    /// Re-list every tender. Returns the number of tenders on the board.
    pub async fn refresh_once(&self) -> Result<usize> {
        let tenders = self.service.gateway().all_tenders(self.network).await?;
        let cache = self.service.cache();

        let placeholders = tenders
            .iter()
            .cloned()
            .map(|t| cache.enrich_cached(t))
            .collect();
        self.publish(placeholders).await;

        let resolved = cache.resolve_all(tenders).await;
        let count = resolved.len();
        self.publish(resolved).await;
        debug!(count, "Board refreshed");
        Ok(count)
    }

    /// Re-fetch one tender and replace its entry. `None` if it does not exist.
    pub async fn refresh_tender(&self, id: u64) -> Result<Option<TenderSummary>> {
        let fetched = self.service.gateway().tender(self.network, id).await?;
        let mut snapshot = self.snapshot.write().await;
        let position = snapshot.tenders.iter().position(|t| t.tender.id == id);

        let Some(tender) = fetched else {
            if let Some(i) = position {
                snapshot.tenders.remove(i);
            }
            return Ok(None);
        };
        // Metadata fetch must not hold the board lock.
        drop(snapshot);
        let enriched = self.service.cache().resolve(tender).await;

        let mut snapshot = self.snapshot.write().await;
        match snapshot.tenders.iter().position(|t| t.tender.id == id) {
            Some(i) => snapshot.tenders[i] = enriched.clone(),
            None => {
                let at = snapshot
                    .tenders
                    .partition_point(|t| t.tender.id < id);
                snapshot.tenders.insert(at, enriched.clone());
            }
        }
        Ok(Some(TenderSummary::new(enriched, unix_now())))
    }

    async fn publish(&self, mut tenders: Vec<EnrichedTender>) {
        tenders.sort_by_key(|t| t.tender.id);
        let mut snapshot = self.snapshot.write().await;
        snapshot.tenders = tenders;
        snapshot.refreshed_at = Some(unix_now());
    }
}

/// Refresh the board every `interval` until `token` is cancelled.
pub async fn run(state: Arc<BoardState>, token: CancellationToken) {
    info!(
        network = %state.network,
        "Board refresh starting, every {}s",
        state.interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            outcome = state.refresh_once() => {
                if let Err(e) = outcome {
                    error!("Board refresh error: {e}");
                }
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(state.interval) => {}
        }
    }
    info!("Board refresh stopped");
}
