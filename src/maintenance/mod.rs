use tokio::time::{Duration, sleep};
use tracing::{error, info};

use crate::{AppState, auth::session};

const CLEANUP_INTERVAL_MINUTES: u64 = 15;

/// Periodically drop session rows whose cookies can no longer authenticate.
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(CLEANUP_INTERVAL_MINUTES * 60);
        loop {
            match session::purge_expired_sessions(state.pool_ref()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired sessions purged"),
                Err(err) => error!(?err, "session cleanup cycle failed"),
            }
            sleep(interval).await;
        }
    });
}
