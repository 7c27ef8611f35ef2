use super::{CompleteUploadResponse, UploadCoordinator, missing_chunks};
use crate::api::error::AppError;
use crate::entities::chunk_infos;
use crate::entities::file_infos::{self, FileStatus};
use crate::utils::validation::is_sha256_hex;
use sea_orm::SqlErr;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const MERGE_BUFFER_SIZE: usize = 64 * 1024;

struct MergedFile {
    size: i64,
    sha256: String,
}

impl UploadCoordinator {
    /// Concatenates all chunks in ascending order into the hash-derived final path
    /// and marks the record completed.
    ///
    /// Safe to retry: a crash after the merge but before the record update leaves
    /// the record `uploading`, and the next call rewrites the same final file.
    pub async fn complete_upload(&self, file_id: &str) -> Result<CompleteUploadResponse, AppError> {
        let _guard = self.file_locks.lock(file_id).await;

        let file = self.load_file(file_id).await?;
        if file.status == FileStatus::Completed {
            tracing::info!("File {} already completed", file.id);
            return Ok(file.into());
        }

        let mut chunks = self.records.list_chunk_records(&file.id).await?;
        chunks.sort_by_key(|c| c.chunk_num);
        let nums: Vec<i32> = chunks.iter().map(|c| c.chunk_num).collect();

        let expected = self.total_chunks(file.file_size);
        if chunks.len() as i64 != expected {
            return Err(AppError::IncompleteUpload {
                expected,
                received: chunks.len(),
                missing: missing_chunks(&nums, expected),
            });
        }
        // The count alone does not prove the range is dense.
        let missing = missing_chunks(&nums, expected);
        if !missing.is_empty() {
            return Err(AppError::IncompleteUpload {
                expected,
                received: chunks.len(),
                missing,
            });
        }

        // Records sharing a hash share the merge target; only one may write it.
        let _content_guard = self
            .file_locks
            .lock(&Self::content_lock_key(&file.file_hash))
            .await;

        if let Some(owner) = self
            .records
            .get_file_record_by_hash(&file.file_hash, Some(FileStatus::Completed))
            .await?
        {
            if owner.id != file.id {
                return Err(AppError::Conflict(format!(
                    "Content {} is already stored as file {}",
                    file.file_hash, owner.id
                )));
            }
        }

        let final_path = self.final_path(&file.file_hash);
        let merged = match self.merge_chunks(&final_path, &chunks).await {
            Ok(merged) => merged,
            Err(e) => {
                self.discard_final(&final_path).await;
                return Err(e);
            }
        };
        tracing::info!(
            "🔗 Merged {} chunks of file {} ({} bytes, sha256 {})",
            chunks.len(),
            file.id,
            merged.size,
            merged.sha256
        );

        if merged.size != file.file_size {
            self.discard_final(&final_path).await;
            return Err(AppError::BadRequest(format!(
                "Merged size {} does not match declared size {}",
                merged.size, file.file_size
            )));
        }

        if self.config.verify_content_hash
            && is_sha256_hex(&file.file_hash)
            && !merged.sha256.eq_ignore_ascii_case(&file.file_hash)
        {
            self.discard_final(&final_path).await;
            tracing::warn!(
                "⚠️ Hash mismatch for file {}: declared {} computed {}",
                file.id,
                file.file_hash,
                merged.sha256
            );
            return Err(AppError::BadRequest(format!(
                "Content hash mismatch: declared {}, computed {}",
                file.file_hash, merged.sha256
            )));
        }

        let file_id = file.id.clone();
        let file_hash = file.file_hash.clone();
        let updated = match self
            .records
            .update_file_record(file_infos::Model {
                status: FileStatus::Completed,
                file_path: final_path.to_string_lossy().into_owned(),
                ..file
            })
            .await
        {
            Ok(updated) => updated,
            // Completed by another process between the owner check and here;
            // the bytes on disk belong to that record now.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(AppError::Conflict(format!(
                    "Content {} is already stored by another file",
                    file_hash
                )));
            }
            Err(e) => {
                self.discard_final(&final_path).await;
                return Err(e.into());
            }
        };

        // Chunk rows stay so a dedup hit can report the full chunk list.
        if let Err(e) = self.blobs.remove_recursive(&self.chunk_dir(&file_id)).await {
            tracing::warn!("Failed to remove chunk folder of file {}: {}", file_id, e);
        }

        tracing::info!("✅ Upload completed: file {}", file_id);
        Ok(updated.into())
    }

    async fn merge_chunks(
        &self,
        dest: &Path,
        chunks: &[chunk_infos::Model],
    ) -> Result<MergedFile, AppError> {
        let mut writer = self.blobs.create_file(dest).await?;
        let mut hasher = Sha256::new();
        let mut size: i64 = 0;
        let mut buffer = vec![0u8; MERGE_BUFFER_SIZE];

        for chunk in chunks {
            let mut reader = self.blobs.open_for_read(Path::new(&chunk.chunk_path)).await?;
            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
                writer.write_all(&buffer[..n]).await?;
                size += n as i64;
            }
        }

        writer.flush().await?;
        writer.shutdown().await?;

        Ok(MergedFile {
            size,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    async fn discard_final(&self, path: &Path) {
        if let Err(e) = self.blobs.remove(path).await {
            tracing::warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}
