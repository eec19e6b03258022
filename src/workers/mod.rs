//! Periodic background tasks. Each worker ticks on its own interval, runs one
//! iteration per tick and stops when the shared token is cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

pub mod announcements;
pub mod cart_cleanup;
pub mod publication;

/// The first tick fires immediately; late ticks are delayed, not bunched up.
pub(crate) fn ticker(secs: u64) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

pub fn spawn_all(state: AppState, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(cart_cleanup::run(state.clone(), cancel.clone())),
        tokio::spawn(announcements::run(state.clone(), cancel.clone())),
        tokio::spawn(publication::run(state, cancel)),
    ]
}
