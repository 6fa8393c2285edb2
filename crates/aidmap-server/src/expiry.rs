use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use aidmap_api::AppState;

/// Background task that retires expired help requests.
///
/// Requests past their `expires_at` are soft-deleted, never removed, so
/// their reports stay attached.
pub async fn run_expiry_loop(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let db_state = Arc::clone(&state);
        let result =
            tokio::task::spawn_blocking(move || db_state.db.expire_help_requests(&Utc::now())).await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Expiry: retired {} help requests", count);
                }
            }
            Ok(Err(e)) => warn!("Expiry sweep error: {}", e),
            Err(e) => warn!("Expiry sweep task failed: {}", e),
        }
    }
}
