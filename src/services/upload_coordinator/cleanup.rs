use super::{CleanupReport, UploadCoordinator};
use crate::api::error::AppError;
use chrono::{Duration, Utc};

impl UploadCoordinator {
    /// Deletes every upload still `uploading` whose last update is older than the
    /// configured expiry. A failing deletion is logged and the sweep moves on.
    pub async fn cleanup_expired_uploads(&self) -> Result<CleanupReport, AppError> {
        let hours = i64::try_from(self.config.cleanup_expiry_hours).unwrap_or(i64::MAX / 3600);
        let expiry = Duration::try_hours(hours).unwrap_or(Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(expiry)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let expired = self.records.list_expired_uploads(cutoff).await?;
        let mut report = CleanupReport {
            expired: expired.len(),
            ..CleanupReport::default()
        };

        for file in expired {
            match self.delete_file(&file.id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::error!("Failed to delete expired upload {}: {}", file.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 {
            tracing::info!(
                "🧹 Expiry sweep: {} expired, {} deleted, {} failed",
                report.expired,
                report.deleted,
                report.failed
            );
        }
        Ok(report)
    }
}
