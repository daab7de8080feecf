//! # Cache Types
//!
//! Records stored in the cache index and the helpers that name them on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A downloaded asset. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Absolute path of the downloaded file
    pub pathname: PathBuf,
    /// When the record should be considered stale
    pub expires: DateTime<Utc>,
}

impl AssetRecord {
    pub fn new(pathname: PathBuf, expires: DateTime<Utc>) -> Self {
        Self { pathname, expires }
    }

    /// Check if the record has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// The path handed back to the host: the file path with the request's
    /// query string re-appended.
    pub fn output_path(&self, url: &Url) -> String {
        let pathname = self.pathname.to_string_lossy();
        match url.query() {
            Some(query) if !query.is_empty() => format!("{pathname}?{query}"),
            _ => pathname.into_owned(),
        }
    }
}

/// The persisted form of the index: canonical URL to resolved record.
pub type CacheIndex = BTreeMap<String, AssetRecord>;

/// File name for a URL: hex SHA-256 of the full href plus the extension.
pub fn content_filename(url: &Url, extension: &str) -> String {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(url.as_str().as_bytes());
    format!("{}.{extension}", hex::encode(hash))
}
