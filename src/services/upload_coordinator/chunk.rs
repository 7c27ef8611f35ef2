use super::UploadCoordinator;
use crate::api::error::AppError;
use crate::entities::chunk_infos;
use crate::entities::file_infos::FileStatus;
use crate::services::record_store::NewChunkRecord;
use tokio::io::AsyncRead;

impl UploadCoordinator {
    /// Stores one chunk and upserts its record.
    ///
    /// Bytes hit the temporary area before the record is written. Re-sending a
    /// chunk number replaces both the bytes and the record in place.
    pub async fn save_chunk<'a>(
        &self,
        file_id: &str,
        chunk_num: i32,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<chunk_infos::Model, AppError> {
        if chunk_num < 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid chunk number: {}",
                chunk_num
            )));
        }

        let file = self.load_file(file_id).await?;
        if file.status != FileStatus::Uploading {
            return Err(AppError::BadRequest(format!(
                "File {} is {} and no longer accepts chunks",
                file.id, file.status
            )));
        }

        self.blobs.ensure_dir(&self.chunk_dir(&file.id)).await?;
        let path = self.chunk_path(&file.id, chunk_num);
        let written = self.blobs.write_file(&path, reader).await?;
        let chunk_path = path.to_string_lossy().into_owned();
        let chunk_size = written as i64;

        let chunk = match self.records.get_chunk_record(&file.id, chunk_num).await? {
            Some(existing) => {
                tracing::debug!("Overwriting chunk {} of file {}", chunk_num, file.id);
                self.records
                    .update_chunk_record(chunk_infos::Model {
                        chunk_size,
                        chunk_path,
                        ..existing
                    })
                    .await?
            }
            None => {
                let created = self
                    .records
                    .create_chunk_record(NewChunkRecord {
                        file_id: file.id.clone(),
                        chunk_num,
                        chunk_size,
                        chunk_path: chunk_path.clone(),
                    })
                    .await;
                match created {
                    Ok(chunk) => chunk,
                    // A concurrent upload of the same chunk won the insert; last writer wins.
                    Err(e) => match self.records.get_chunk_record(&file.id, chunk_num).await? {
                        Some(existing) => {
                            self.records
                                .update_chunk_record(chunk_infos::Model {
                                    chunk_size,
                                    chunk_path,
                                    ..existing
                                })
                                .await?
                        }
                        None => return Err(e.into()),
                    },
                }
            }
        };

        self.records.touch_file_record(&file.id).await?;

        tracing::debug!(
            "📦 Chunk {} of file {} stored ({} bytes)",
            chunk_num,
            file.id,
            chunk_size
        );
        Ok(chunk)
    }
}
