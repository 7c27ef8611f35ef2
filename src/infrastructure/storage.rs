use crate::config::UploadConfig;
use crate::services::blob_store::{BlobStore, LocalBlobStore};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &UploadConfig) -> anyhow::Result<Arc<LocalBlobStore>> {
    let store = LocalBlobStore::new();

    store.ensure_dir(&config.upload_dir).await?;
    store.ensure_dir(&config.temp_dir).await?;

    info!(
        "💾 Blob Storage: uploads={} temp={}",
        config.upload_dir.display(),
        config.temp_dir.display()
    );

    Ok(Arc::new(store))
}
