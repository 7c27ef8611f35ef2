use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::entities::file_infos;
use crate::services::blob_store::BlobStore;
use crate::services::record_store::RecordStore;
use crate::utils::keyed_mutex::KeyedMutex;
use std::path::PathBuf;
use std::sync::Arc;

pub mod chunk;
pub mod cleanup;
pub mod complete;
pub mod delete;
pub mod init;
pub mod status;
pub mod types;

pub use types::*;

/// Owns the upload lifecycle: init, chunk ingestion, merge, status, deletion and expiry.
pub struct UploadCoordinator {
    records: RecordStore,
    blobs: Arc<dyn BlobStore>,
    config: UploadConfig,
    file_locks: KeyedMutex,
}

impl UploadCoordinator {
    pub fn new(records: RecordStore, blobs: Arc<dyn BlobStore>, config: UploadConfig) -> Self {
        Self {
            records,
            blobs,
            config,
            file_locks: KeyedMutex::new(),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn total_chunks(&self, file_size: i64) -> i64 {
        total_chunks(file_size, self.config.chunk_size)
    }

    /// Database reachable and upload directory present.
    pub async fn health(&self) -> (bool, bool) {
        let db_ok = self.records.ping().await.is_ok();
        let blobs_ok = self
            .blobs
            .exists(&self.config.upload_dir)
            .await
            .unwrap_or(false);
        (db_ok, blobs_ok)
    }

    /// Forgets per-file locks that nobody holds.
    pub fn prune_locks(&self) {
        self.file_locks.cleanup();
    }

    fn chunk_dir(&self, file_id: &str) -> PathBuf {
        self.config.temp_dir.join(file_id)
    }

    fn chunk_path(&self, file_id: &str, chunk_num: i32) -> PathBuf {
        self.chunk_dir(file_id).join(chunk_num.to_string())
    }

    /// Lock key for the bytes at `final_path(file_hash)`. File ids are UUIDs,
    /// so the prefix keeps the two key spaces apart.
    fn content_lock_key(file_hash: &str) -> String {
        format!("content:{}", file_hash)
    }

    fn final_path(&self, file_hash: &str) -> PathBuf {
        self.config.upload_dir.join(file_hash)
    }

    async fn load_file(&self, file_id: &str) -> Result<file_infos::Model, AppError> {
        self.records
            .get_file_record_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))
    }

    /// Received chunk numbers, ascending.
    async fn uploaded_chunk_nums(&self, file_id: &str) -> Result<Vec<i32>, AppError> {
        let mut nums: Vec<i32> = self
            .records
            .list_chunk_records(file_id)
            .await?
            .into_iter()
            .map(|c| c.chunk_num)
            .collect();
        nums.sort_unstable();
        Ok(nums)
    }
}
