use crate::api::error::AppError;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::borrow::Cow;

/// Shortest and longest accepted content hash (MD5 hex is 32, SHA-512 hex is 128).
pub const MIN_HASH_LEN: usize = 8;
pub const MAX_HASH_LEN: usize = 128;

/// The hash names the merged file on disk, so it must be a plain token.
pub fn is_safe_hash(hash: &str) -> bool {
    (MIN_HASH_LEN..=MAX_HASH_LEN).contains(&hash.len())
        && hash.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn is_sha256_hex(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `validator` hook for request structs.
pub fn validate_file_hash(hash: &str) -> Result<(), validator::ValidationError> {
    if is_safe_hash(hash) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_hash").with_message(Cow::from(format!(
            "File hash must be {}-{} alphanumeric characters",
            MIN_HASH_LEN, MAX_HASH_LEN
        ))))
    }
}

pub fn validate_file_size(size: i64, max_size: u64) -> Result<(), AppError> {
    if size <= 0 {
        return Err(AppError::BadRequest(
            "File size must be positive".to_string(),
        ));
    }
    if size as u64 > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
            size,
            max_size,
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Checks `content_type` against the allow-list. Entries may be exact
/// (`image/png`) or wildcards (`image/*`). An empty list allows everything.
pub fn validate_mime_type(content_type: &str, allowed: &[String]) -> Result<(), AppError> {
    let parsed: mime::Mime = content_type
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid content type: {}", content_type)))?;

    if allowed.is_empty() {
        return Ok(());
    }

    let essence = parsed.essence_str().to_lowercase();
    let wildcard = format!("{}/*", parsed.type_().as_str().to_lowercase());
    if allowed.iter().any(|a| *a == essence || *a == wildcard || a == "*/*") {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType(format!(
            "Content type {} is not allowed",
            essence
        )))
    }
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
