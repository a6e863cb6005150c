use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::{info, warn};

use amity_api::AppState;

/// Accounts marked for deletion are kept this long before the sweep
/// hard-deletes them.
const RETENTION_DAYS: i64 = 7;

/// Background task that hard-deletes accounts whose deletion request has
/// outlived the retention window.
///
/// Runs on an interval (daily by default), concurrently with request
/// traffic; the store-level delete re-checks the pending mark so a
/// cancellation racing the sweep always wins.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let state = state.clone();
        let result = tokio::task::spawn_blocking(move || {
            state
                .db
                .sweep_expired(Utc::now(), TimeDelta::days(RETENTION_DAYS))
        })
        .await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweep: removed {} expired accounts", count);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep join error: {}", e),
        }
    }
}
