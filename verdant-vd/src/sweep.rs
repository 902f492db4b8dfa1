//! Staleness sweep
//!
//! Discovered records nobody has re-scraped within the configured window
//! stop being trustworthy review candidates. The sweep runs on an interval
//! in the background and is also exposed as a manual trigger over HTTP.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use verdant_common::events::{EventBus, VenueEvent};

use crate::db::{self, StoreError};

/// Run one sweep pass. Returns the number of venues marked stale.
pub async fn mark_stale(
    pool: &SqlitePool,
    event_bus: &EventBus,
    stale_after_days: i64,
) -> Result<u64, StoreError> {
    let cutoff = Utc::now() - Duration::days(stale_after_days);
    let count = db::discovered_venues::mark_stale_before(pool, cutoff).await?;

    if count > 0 {
        info!(count, stale_after_days, "marked discovered venues stale");
        event_bus.emit_lossy(VenueEvent::VenuesMarkedStale {
            count,
            timestamp: Utc::now(),
        });
    }

    Ok(count)
}

/// Spawn the periodic sweep task. Stops when the token is cancelled.
pub fn spawn_staleness_sweep(
    pool: SqlitePool,
    event_bus: EventBus,
    stale_after_days: i64,
    interval_minutes: u64,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_minutes * 60));
        // First tick fires immediately; skip it so startup isn't a sweep
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("staleness sweep stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = mark_stale(&pool, &event_bus, stale_after_days).await {
                        error!(error = %e, "staleness sweep failed");
                    }
                }
            }
        }
    });
}
