use std::env;
use std::path::PathBuf;

/// Upload configuration for the chunked upload coordinator
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory holding merged, completed files (default: "./uploads")
    pub upload_dir: PathBuf,

    /// Directory holding per-file chunk folders (default: "./uploads/tmp")
    pub temp_dir: PathBuf,

    /// Maximum declared file size in bytes (default: 1 GB)
    pub max_file_size: u64,

    /// Chunk size handed out to clients in bytes (default: 5 MB)
    pub chunk_size: u64,

    /// Allowed MIME types, lowercase. Empty means every type is accepted.
    pub allowed_types: Vec<String>,

    /// Age in hours after which an unfinished upload is swept (default: 24)
    pub cleanup_expiry_hours: u64,

    /// Seconds between two expiry sweeps of the background worker (default: 3600)
    pub cleanup_interval_secs: u64,

    /// Compare the merged SHA-256 digest against the declared hash (default: false)
    pub verify_content_hash: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            temp_dir: PathBuf::from("./uploads/tmp"),
            max_file_size: 1024 * 1024 * 1024, // 1 GB
            chunk_size: 5 * 1024 * 1024,       // 5 MB
            allowed_types: Vec::new(),
            cleanup_expiry_hours: 24,
            cleanup_interval_secs: 3600,
            verify_content_hash: false,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            // Zero would make every chunk count undefined
            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.chunk_size),

            allowed_types: env::var("ALLOWED_TYPES")
                .ok()
                .map(|v| parse_allowed_types(&v))
                .unwrap_or(default.allowed_types),

            cleanup_expiry_hours: env::var("CLEANUP_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cleanup_expiry_hours),

            cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.cleanup_interval_secs),

            verify_content_hash: env::var("VERIFY_CONTENT_HASH")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.verify_content_hash),
        }
    }

    /// Create config for development (small chunks, every type allowed)
    pub fn development() -> Self {
        Self {
            upload_dir: PathBuf::from("./data/uploads"),
            temp_dir: PathBuf::from("./data/tmp"),
            max_file_size: 256 * 1024 * 1024,
            chunk_size: 1024 * 1024, // 1 MB
            allowed_types: Vec::new(),
            cleanup_expiry_hours: 1,
            cleanup_interval_secs: 300,
            verify_content_hash: true,
        }
    }

    /// Body limit for the chunk route: one chunk plus multipart framing.
    pub fn chunk_body_limit(&self) -> usize {
        let chunk = usize::try_from(self.chunk_size).unwrap_or(usize::MAX);
        chunk.saturating_mul(2).max(16 * 1024 * 1024)
    }
}

/// Splits a comma-separated MIME list, dropping blanks.
pub fn parse_allowed_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.max_file_size, 1024 * 1024 * 1024);
        assert_eq!(config.chunk_size, 5 * 1024 * 1024);
        assert_eq!(config.cleanup_expiry_hours, 24);
        assert!(config.allowed_types.is_empty());
        assert!(!config.verify_content_hash);
    }

    #[test]
    fn test_development_config() {
        let config = UploadConfig::development();
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert!(config.verify_content_hash);
    }

    #[test]
    fn test_parse_allowed_types() {
        let types = parse_allowed_types(" image/png, Application/PDF ,,text/* ");
        assert_eq!(types, vec!["image/png", "application/pdf", "text/*"]);
        assert!(parse_allowed_types("").is_empty());
    }

    #[test]
    fn test_chunk_body_limit_has_floor() {
        let config = UploadConfig {
            chunk_size: 100,
            ..UploadConfig::default()
        };
        assert_eq!(config.chunk_body_limit(), 16 * 1024 * 1024);

        let config = UploadConfig {
            chunk_size: 32 * 1024 * 1024,
            ..UploadConfig::default()
        };
        assert_eq!(config.chunk_body_limit(), 64 * 1024 * 1024);
    }
}
