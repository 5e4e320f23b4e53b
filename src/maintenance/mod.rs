use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{Duration, sleep};
use tracing::{error, info};

use crate::accounts::AccountStore;

const CLEANUP_INTERVAL_MINUTES: u64 = 15;

/// Periodically drop sessions whose expiry has passed.
pub fn spawn(accounts: Arc<dyn AccountStore>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(CLEANUP_INTERVAL_MINUTES * 60);
        loop {
            if let Err(err) = run_cleanup_cycle(accounts.as_ref()).await {
                error!(?err, "session cleanup cycle failed");
            }
            sleep(interval).await;
        }
    });
}

async fn run_cleanup_cycle(accounts: &dyn AccountStore) -> Result<u64> {
    let purged = accounts
        .purge_expired_sessions()
        .await
        .context("failed to purge expired sessions")?;

    if purged > 0 {
        info!(purged, "expired sessions purged");
    }

    Ok(purged)
}
