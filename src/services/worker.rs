use crate::services::upload_coordinator::UploadCoordinator;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Runs the expiry sweep on a fixed interval until shutdown is signalled.
pub struct BackgroundWorker {
    coordinator: Arc<UploadCoordinator>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        coordinator: Arc<UploadCoordinator>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            coordinator,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Background worker started (sweep every {:?})",
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    pub async fn perform_cleanup(&self) {
        tracing::info!("🧹 Running expired upload sweep...");

        match self.coordinator.cleanup_expired_uploads().await {
            Ok(report) => tracing::info!(
                "✅ Sweep completed: {} expired, {} deleted, {} failed",
                report.expired,
                report.deleted,
                report.failed
            ),
            Err(e) => tracing::error!("❌ Expired upload sweep failed: {}", e),
        }

        self.coordinator.prune_locks();
    }
}
