use super::{InitStatus, InitUploadRequest, InitUploadResponse, UploadCoordinator};
use crate::api::error::AppError;
use crate::entities::file_infos::FileStatus;
use crate::services::record_store::NewFileRecord;
use crate::utils::validation::is_safe_hash;
use uuid::Uuid;

impl UploadCoordinator {
    /// Starts an upload, or short-circuits when a completed file already has this hash.
    ///
    /// Uploads still in progress are not deduplicated: two calls with the same
    /// hash before completion yield two independent records.
    pub async fn init_upload(&self, req: InitUploadRequest) -> Result<InitUploadResponse, AppError> {
        if req.file_size <= 0 {
            return Err(AppError::BadRequest(
                "File size must be positive".to_string(),
            ));
        }
        if !is_safe_hash(&req.file_hash) {
            return Err(AppError::BadRequest(format!(
                "Invalid file hash: {}",
                req.file_hash
            )));
        }

        let total_chunks = self.total_chunks(req.file_size);

        if let Some(existing) = self
            .records
            .get_file_record_by_hash(&req.file_hash, Some(FileStatus::Completed))
            .await?
        {
            let uploaded_chunks = self.uploaded_chunk_nums(&existing.id).await?;
            tracing::info!(
                "♻️ Dedup hit for hash {}: reusing file {}",
                req.file_hash,
                existing.id
            );
            return Ok(InitUploadResponse {
                file_id: existing.id,
                upload_id: Uuid::new_v4().to_string(),
                chunk_size: self.config.chunk_size,
                total_chunks,
                status: InitStatus::Completed,
                uploaded_chunks,
            });
        }

        let file_path = self.final_path(&req.file_hash);
        let record = self
            .records
            .create_file_record(NewFileRecord {
                file_name: req.file_name,
                file_path: file_path.to_string_lossy().into_owned(),
                file_size: req.file_size,
                file_hash: req.file_hash,
                content_type: req.content_type,
            })
            .await?;

        tracing::info!(
            "📝 Upload initialized: file {} ({} bytes, {} chunks)",
            record.id,
            record.file_size,
            total_chunks
        );

        Ok(InitUploadResponse {
            file_id: record.id,
            upload_id: Uuid::new_v4().to_string(),
            chunk_size: self.config.chunk_size,
            total_chunks,
            status: InitStatus::Initialized,
            uploaded_chunks: Vec::new(),
        })
    }
}
