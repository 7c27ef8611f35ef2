use super::UploadCoordinator;
use crate::api::error::AppError;
use std::path::Path;

impl UploadCoordinator {
    /// Removes bytes best-effort, then the chunk rows and the file row.
    ///
    /// Filesystem failures are logged; record-store failures fail the call.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), AppError> {
        let _guard = self.file_locks.lock(file_id).await;

        let file = self.load_file(file_id).await?;

        if !file.file_path.is_empty() {
            let _content_guard = self
                .file_locks
                .lock(&Self::content_lock_key(&file.file_hash))
                .await;

            // Another completed record may point at the same hash-derived path.
            let sharers = self
                .records
                .count_completed_by_path(&file.file_path, &file.id)
                .await?;
            if sharers == 0 {
                if let Err(e) = self.blobs.remove(Path::new(&file.file_path)).await {
                    tracing::warn!("Failed to remove content of file {}: {}", file.id, e);
                }
            } else {
                tracing::info!(
                    "Keeping {} for file {}: still referenced by {} completed record(s)",
                    file.file_path,
                    file.id,
                    sharers
                );
            }
        }

        if let Err(e) = self.blobs.remove_recursive(&self.chunk_dir(&file.id)).await {
            tracing::warn!("Failed to remove chunk folder of file {}: {}", file.id, e);
        }

        let removed = self.records.delete_chunk_records(&file.id).await?;
        self.records.delete_file_record(&file.id).await?;

        tracing::info!("🗑️ Deleted file {} ({} chunk records)", file.id, removed);
        Ok(())
    }
}
