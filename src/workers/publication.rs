use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::AppResult,
    services::{product_service, telegram_service},
    state::AppState,
    workers::ticker,
};

pub const CATALOG_UPDATED_MESSAGE: &str =
    "Уважаемые дамы, каталог был обновлен. Успевайте забронировать товар!";

/// Products already announced, with the time they were announced.
///
/// Lives in process memory only: a restart inside the publication window can
/// announce the same products again, and several instances do not share it.
#[derive(Debug)]
pub struct NotifiedCache {
    entries: HashMap<Uuid, DateTime<Utc>>,
    ttl: Duration,
}

impl NotifiedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, at| now - *at < ttl);
    }

    /// Ids from `candidates` that were not announced yet.
    pub fn unseen(&self, candidates: &[Uuid]) -> Vec<Uuid> {
        candidates
            .iter()
            .filter(|id| !self.entries.contains_key(id))
            .copied()
            .collect()
    }

    pub fn mark(&mut self, ids: &[Uuid], now: DateTime<Utc>) {
        for id in ids {
            self.entries.insert(*id, now);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One poll: broadcast a single "catalog updated" message when any product
/// became visible within the window and was not announced yet. Returns the
/// number of newly announced products.
pub async fn run_once(state: &AppState, cache: &mut NotifiedCache, now: DateTime<Utc>) -> AppResult<usize> {
    cache.prune(now);

    let window = Duration::minutes(state.config.workers.publication_window_minutes);
    let ready = product_service::list_ready_for_publication(&state.orm, now, window).await?;
    let ids: Vec<Uuid> = ready.iter().map(|p| p.id).collect();
    let fresh = cache.unseen(&ids);
    if fresh.is_empty() {
        return Ok(0);
    }

    info!(count = fresh.len(), "products became visible");
    let sent = telegram_service::broadcast(state, CATALOG_UPDATED_MESSAGE).await?;
    cache.mark(&fresh, now);
    info!(sent, "catalog update announced");
    Ok(fresh.len())
}

pub async fn run(state: AppState, cancel: CancellationToken) {
    let interval_secs = state.config.workers.publication_interval_secs;
    let mut interval = ticker(interval_secs);
    let mut cache = NotifiedCache::new(Duration::minutes(
        state.config.workers.publication_dedup_ttl_minutes,
    ));
    info!(interval_secs, "publication worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = run_once(&state, &mut cache, Utc::now()).await {
                    error!(error = %err, "publication check failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("publication worker shutting down");
                break;
            }
        }
    }
}
