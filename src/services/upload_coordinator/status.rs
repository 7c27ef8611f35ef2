use super::{FileInfoResponse, UploadCoordinator, UploadStatusResponse, progress_percent};
use crate::api::error::AppError;
use crate::entities::file_infos::{self, FileStatus};
use crate::services::blob_store::BlobReader;
use std::io::ErrorKind;
use std::path::Path;

impl UploadCoordinator {
    pub async fn get_upload_status(&self, file_id: &str) -> Result<UploadStatusResponse, AppError> {
        let file = self.load_file(file_id).await?;
        let uploaded_chunks = self.uploaded_chunk_nums(&file.id).await?;
        let total_chunks = self.total_chunks(file.file_size);
        let progress = progress_percent(uploaded_chunks.len(), total_chunks);

        Ok(UploadStatusResponse {
            file_id: file.id,
            file_name: file.file_name,
            file_size: file.file_size,
            status: file.status,
            total_chunks,
            uploaded_chunks,
            progress,
        })
    }

    pub async fn get_file_info(&self, file_id: &str) -> Result<file_infos::Model, AppError> {
        self.load_file(file_id).await
    }

    /// Completed files only.
    pub async fn list_files(&self) -> Result<Vec<FileInfoResponse>, AppError> {
        let files = self
            .records
            .list_file_records(Some(FileStatus::Completed))
            .await?;
        Ok(files.into_iter().map(FileInfoResponse::from).collect())
    }

    /// Opens the merged bytes of a completed file.
    pub async fn open_file(&self, file: &file_infos::Model) -> Result<BlobReader, AppError> {
        if file.status != FileStatus::Completed {
            return Err(AppError::NotFound(format!(
                "File {} is not available for download",
                file.id
            )));
        }
        self.blobs
            .open_for_read(Path::new(&file.file_path))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    AppError::NotFound(format!("Content of file {} is missing", file.id))
                }
                _ => AppError::Io(e),
            })
    }
}
