use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    error::AppResult, inventory::reservation_cutoff, services::cart_service, state::AppState,
    workers::ticker,
};

/// Delete cart lines whose reservation expired. Returns the number removed.
pub async fn run_once(state: &AppState, now: DateTime<Utc>) -> AppResult<u64> {
    let cutoff = reservation_cutoff(now, state.config.reservation_ttl());
    let removed = cart_service::delete_stale(&state.orm, cutoff).await?;
    if removed > 0 {
        info!(removed, cutoff = %cutoff, "expired cart reservations removed");
    }
    Ok(removed)
}

pub async fn run(state: AppState, cancel: CancellationToken) {
    let interval_secs = state.config.workers.cart_cleanup_interval_secs;
    let mut interval = ticker(interval_secs);
    info!(interval_secs, "cart cleanup worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = run_once(&state, Utc::now()).await {
                    error!(error = %err, "cart cleanup failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("cart cleanup worker shutting down");
                break;
            }
        }
    }
}
