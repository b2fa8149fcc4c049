use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use cycle_api::state::AppStateInner;

/// Background task that drops expired verification and reset tokens.
///
/// Lookups already ignore expired rows; this only keeps the table small.
pub async fn run_cleanup_loop(state: Arc<AppStateInner>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = state.clone();
        let purged = tokio::task::spawn_blocking(move || db_state.db.purge_expired_tokens()).await;

        match purged {
            Ok(Ok(0)) => {}
            Ok(Ok(count)) => info!("Cleanup: purged {} expired tokens", count),
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task failed: {}", e),
        }
    }
}
