//! # Cache Index Store
//!
//! Loads and writes `index.json`, the single document mapping URLs to
//! downloaded files. A missing or unreadable index never fails a build.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::cache::types::CacheIndex;
use crate::error::CacheStoreError;

/// File name of the index inside the cache directory.
pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Clone)]
pub struct CacheIndexStore {
    cache_dir: PathBuf,
}

impl CacheIndexStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE_NAME)
    }

    /// Loads the index, returning an empty one on any failure.
    pub async fn load(&self) -> CacheIndex {
        match self.try_load().await {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Could not restore cache");
                CacheIndex::new()
            }
        }
    }

    /// Like [`load`](Self::load) but reports why the index could not be read.
    /// A missing file is not an error.
    pub async fn try_load(&self) -> Result<CacheIndex, CacheStoreError> {
        let path = self.index_path();
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = ?path, "No cache index yet");
                return Ok(CacheIndex::new());
            }
            Err(source) => return Err(CacheStoreError::Io { path, source }),
        };

        let index: CacheIndex = serde_json::from_slice(&content)
            .map_err(|source| CacheStoreError::Json { path: path.clone(), source })?;

        debug!(path = ?path, entries = index.len(), "Restored cache index");
        Ok(index)
    }

    /// Writes the whole index in one pass, creating the cache directory if
    /// needed. Returns the number of entries written.
    pub async fn persist(&self, index: &CacheIndex) -> Result<usize, CacheStoreError> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|source| CacheStoreError::Io {
                path: self.cache_dir.clone(),
                source,
            })?;

        let path = self.index_path();
        let content = serde_json::to_vec_pretty(index).map_err(|source| CacheStoreError::Json {
            path: path.clone(),
            source,
        })?;

        fs::write(&path, content)
            .await
            .map_err(|source| CacheStoreError::Io { path: path.clone(), source })?;

        debug!(path = ?path, entries = index.len(), "Persisted cache index");
        Ok(index.len())
    }
}
