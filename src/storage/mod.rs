//! Asset storage abstraction over Apache Arrow object_store.
//!
//! Uploaded media lands here before inference sees it; archive building
//! re-fetches the same bytes later via the stored public URL.

use bytes::Bytes;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("url does not belong to this store: {0}")]
    ForeignUrl(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored asset's addressable location.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub key: String,
    pub url: String,
    pub size: usize,
}

/// Storage client wrapping any object_store backend.
#[derive(Clone)]
pub struct AssetStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl AssetStore {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: String) -> Self {
        Self {
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// In-memory backend for tests and the standalone dev server.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            "memory://tagmill".to_string(),
        )
    }

    /// Upload one media file and return its public URL.
    ///
    /// Keys are content-addressed per upload (`assets/{uuid}/{name}`), so
    /// queueing the same file twice stores it twice; item identity, not
    /// content identity, is what the pipeline tracks.
    pub async fn upload(&self, file_name: &str, content_type: &str, data: Bytes) -> Result<StoredAsset> {
        let key = format!("assets/{}/{}", Uuid::now_v7(), file_name);
        let path = StoragePath::from(key.as_str());
        let size = data.len();

        let attributes = object_store::Attributes::from_iter([(
            object_store::Attribute::ContentType,
            content_type.to_string(),
        )]);
        let options = object_store::PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, data.into(), options)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(key = %key, size, content_type, "Asset uploaded");

        Ok(StoredAsset {
            url: format!("{}/{}", self.public_base_url, key),
            key,
            size,
        })
    }

    /// Fetch asset bytes by the public URL minted at upload time.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let key = self.key_for(url)?;
        let path = StoragePath::from(key);

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| StorageError::FetchFailed(e.to_string()))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::FetchFailed(e.to_string()))?;

        tracing::debug!(url, size = bytes.len(), "Asset fetched");
        Ok(bytes)
    }

    fn key_for<'a>(&self, url: &'a str) -> Result<&'a str> {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))
    }
}
