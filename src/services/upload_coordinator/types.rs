use crate::entities::file_infos::{self, FileStatus};
use crate::utils::validation::validate_file_hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct InitUploadRequest {
    #[validate(length(min = 1, max = 255, message = "File name is required"))]
    pub file_name: String,
    #[validate(range(min = 1, message = "File size must be positive"))]
    pub file_size: i64,
    #[validate(custom(function = "validate_file_hash"))]
    pub file_hash: String,
    #[validate(length(min = 1, max = 128, message = "Content type is required"))]
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InitStatus {
    /// Fresh upload; send every chunk.
    Initialized,
    /// Dedup hit; nothing to send.
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitUploadResponse {
    pub file_id: String,
    /// Opaque per-call session token.
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: i64,
    pub status: InitStatus,
    pub uploaded_chunks: Vec<i32>,
}

/// Multipart body of the chunk route (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ChunkUploadForm {
    pub file_id: String,
    pub chunk_num: i32,
    #[schema(value_type = String, format = Binary)]
    pub chunk: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChunkUploadResponse {
    pub file_id: String,
    pub chunk_num: i32,
    pub chunk_size: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CompleteUploadRequest {
    #[validate(length(min = 1, message = "file_id is required"))]
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub file_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub status: FileStatus,
}

impl From<file_infos::Model> for CompleteUploadResponse {
    fn from(file: file_infos::Model) -> Self {
        Self {
            file_id: file.id,
            file_name: file.file_name,
            file_path: file.file_path,
            file_size: file.file_size,
            status: file.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadStatusResponse {
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub status: FileStatus,
    pub total_chunks: i64,
    pub uploaded_chunks: Vec<i32>,
    /// Whole percent, 0..=100.
    pub progress: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileInfoResponse {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,
    pub content_type: String,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<file_infos::Model> for FileInfoResponse {
    fn from(file: file_infos::Model) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name,
            file_path: file.file_path,
            file_size: file.file_size,
            file_hash: file.file_hash,
            content_type: file.content_type,
            status: file.status,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileInfoResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponse {
    pub file_id: String,
    pub status: String,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// `ceil(file_size / chunk_size)`; zero for empty files or a zero chunk size.
pub fn total_chunks(file_size: i64, chunk_size: u64) -> i64 {
    if file_size <= 0 || chunk_size == 0 {
        return 0;
    }
    let chunk_size = i64::try_from(chunk_size).unwrap_or(i64::MAX);
    (file_size - 1) / chunk_size + 1
}

/// `floor(received * 100 / total)`, capped at 100.
pub fn progress_percent(received: usize, total_chunks: i64) -> i64 {
    if total_chunks <= 0 {
        return 0;
    }
    (received as i64 * 100 / total_chunks).min(100)
}

/// Upper bound on the chunk numbers reported by [`missing_chunks`].
pub const MAX_REPORTED_MISSING: usize = 64;

/// Chunk numbers missing from a dense range starting at 0 or 1, at most
/// [`MAX_REPORTED_MISSING`] of them.
///
/// `sorted` must be ascending. A set starting at 1 is read as one-based;
/// anything else is checked against `0..expected`.
pub fn missing_chunks(sorted: &[i32], expected: i64) -> Vec<i32> {
    let base: i64 = if sorted.first() == Some(&1) { 1 } else { 0 };
    let mut missing = Vec::new();
    let mut present = sorted.iter().peekable();
    for n in base..base.saturating_add(expected) {
        if missing.len() >= MAX_REPORTED_MISSING {
            break;
        }
        // Chunk numbers are i32; nothing above that can ever be stored.
        let Ok(n) = i32::try_from(n) else {
            break;
        };
        while present.next_if(|&&p| p < n).is_some() {}
        if present.next_if(|&&p| p == n).is_none() {
            missing.push(n);
        }
    }
    missing
}
