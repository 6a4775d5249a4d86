use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::SyncOutcome;
use crate::services::orchestrator::{DownloadConsent, SyncOrchestrator};

/// Periodically asks the orchestrator to sync. The daily freshness check
/// decides whether anything is actually downloaded.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    consent: Arc<dyn DownloadConsent>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        interval_secs: u64,
        consent: Arc<dyn DownloadConsent>,
    ) -> Self {
        Self {
            orchestrator,
            consent,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn start(self, shutdown: CancellationToken) {
        info!("Starting auto-sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Auto-sync scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.orchestrator.sync(Utc::now(), self.consent.as_ref()).await {
                Ok(SyncOutcome::Completed(report)) => {
                    info!(
                        "Auto-sync completed - {} pages, {} records, {} removed",
                        report.pages, report.records, report.removed
                    );
                }
                Ok(outcome) => debug!("Auto-sync skipped: {:?}", outcome),
                Err(e) => {
                    // keep looping; the next tick retries
                    warn!("Auto-sync failed: {:?}", e);
                }
            }
        }
    }
}
