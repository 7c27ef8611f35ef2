use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

pub type BlobReader = Box<dyn AsyncRead + Unpin + Send>;
pub type BlobWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Bytes-on-disk for chunk folders and merged files.
///
/// `remove` and `remove_recursive` are best-effort: a missing path is not an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn ensure_dir(&self, path: &Path) -> io::Result<()>;
    /// Writes `reader` to `path`, replacing previous content. Returns bytes written.
    async fn write_file<'a>(
        &self,
        path: &Path,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> io::Result<u64>;
    /// Creates (or truncates) `path` for sequential appends.
    async fn create_file(&self, path: &Path) -> io::Result<BlobWriter>;
    async fn open_for_read(&self, path: &Path) -> io::Result<BlobReader>;
    async fn exists(&self, path: &Path) -> io::Result<bool>;
    async fn remove(&self, path: &Path) -> io::Result<()>;
    async fn remove_recursive(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct LocalBlobStore;

impl LocalBlobStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn write_file<'a>(
        &self,
        path: &Path,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> io::Result<u64> {
        let mut file = fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }

    async fn create_file(&self, path: &Path) -> io::Result<BlobWriter> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = fs::File::create(path).await?;
        Ok(Box::new(file))
    }

    async fn open_for_read(&self, path: &Path) -> io::Result<BlobReader> {
        let file = fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn remove_recursive(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new();
        let path = dir.path().join("0");

        let first: &[u8] = b"first payload";
        assert_eq!(store.write_file(&path, Box::new(first)).await.unwrap(), 13);
        let second: &[u8] = b"2nd";
        assert_eq!(store.write_file(&path, Box::new(second)).await.unwrap(), 3);

        let mut content = Vec::new();
        store
            .open_for_read(&path)
            .await
            .unwrap()
            .read_to_end(&mut content)
            .await
            .unwrap();
        assert_eq!(content, b"2nd");
    }

    #[tokio::test]
    async fn test_removals_ignore_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new();

        store.remove(&dir.path().join("missing")).await.unwrap();
        store
            .remove_recursive(&dir.path().join("missing-dir"))
            .await
            .unwrap();

        let nested = dir.path().join("a").join("b");
        store.ensure_dir(&nested).await.unwrap();
        assert!(store.exists(&nested).await.unwrap());
        store.remove_recursive(&dir.path().join("a")).await.unwrap();
        assert!(!store.exists(&nested).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new();
        let err = match store.open_for_read(&dir.path().join("nope")).await {
            Ok(_) => panic!("expected missing file"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
