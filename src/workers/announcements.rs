use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    error::AppResult,
    models::json_strings,
    services::{announcement_service, telegram_service},
    state::AppState,
    workers::ticker,
};

/// Send every announcement that came due within the catch-up window.
/// Returns how many were marked sent.
///
/// Delivery is best effort: an announcement is marked sent even when only
/// some recipients got it, and it is never retried.
pub async fn run_once(state: &AppState, now: DateTime<Utc>) -> AppResult<usize> {
    let window = Duration::minutes(state.config.workers.announcement_window_minutes);
    let due = announcement_service::list_due(&state.orm, now, window).await?;
    if due.is_empty() {
        debug!("no announcements due");
        return Ok(0);
    }
    info!(count = due.len(), "announcements due");

    let mut dispatched = 0;
    for announcement in due {
        let id = announcement.id;
        let collages = json_strings(&announcement.collage_images);
        let sent = if collages.is_empty() {
            telegram_service::broadcast(state, &announcement.message).await
        } else {
            telegram_service::broadcast_with_photos(state, &announcement.message, &collages).await
        };
        let sent = match sent {
            Ok(sent) => sent,
            Err(err) => {
                error!(announcement_id = %id, error = %err, "announcement broadcast failed");
                continue;
            }
        };

        match announcement_service::mark_sent(&state.orm, announcement, sent, Utc::now()).await {
            Ok(()) => {
                dispatched += 1;
                info!(announcement_id = %id, sent, "announcement sent");
            }
            Err(err) => error!(announcement_id = %id, error = %err, "failed to mark announcement sent"),
        }
    }
    Ok(dispatched)
}

pub async fn run(state: AppState, cancel: CancellationToken) {
    let interval_secs = state.config.workers.announcement_interval_secs;
    let mut interval = ticker(interval_secs);
    info!(interval_secs, "announcement worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = run_once(&state, Utc::now()).await {
                    error!(error = %err, "announcement check failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("announcement worker shutting down");
                break;
            }
        }
    }
}
