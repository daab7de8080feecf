//! Download executor: one fetch, one content-addressed file, one record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{AssetRecord, compute_expiry, content_filename};
use crate::error::FetchError;
use crate::fetcher::Fetch;
use crate::mime::extension_for;

pub struct AssetDownloader {
    fetcher: Arc<dyn Fetch>,
    cache_dir: PathBuf,
    default_max_age: Duration,
}

impl AssetDownloader {
    pub fn new(fetcher: Arc<dyn Fetch>, cache_dir: impl Into<PathBuf>, default_max_age: Duration) -> Self {
        Self {
            fetcher,
            cache_dir: cache_dir.into(),
            default_max_age,
        }
    }

    /// Where a URL's content lands for a given extension.
    pub fn path_for(&self, url: &Url, extension: &str) -> PathBuf {
        self.cache_dir.join(content_filename(url, extension))
    }

    /// Fetches `url` and writes the body under the cache directory.
    ///
    /// The record is only produced after the file is completely written; an
    /// existing file for the same URL is replaced.
    pub async fn download(&self, url: &Url) -> Result<AssetRecord, FetchError> {
        info!("↓ {url}");

        let asset = self.fetcher.fetch(url).await?;

        let extension = extension_for(asset.content_type.as_deref());
        let pathname = self.path_for(url, extension);

        if let Some(parent) = pathname.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        // Write next to the target then rename over it.
        let mut temp_name = pathname.clone().into_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        if let Err(e) = fs::write(&temp_path, &asset.body).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(FetchError::io(&temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &pathname).await {
            warn!(from = ?temp_path, to = ?pathname, error = %e, "Failed to move downloaded asset into place");
            let _ = fs::remove_file(&temp_path).await;
            return Err(FetchError::io(&pathname, e));
        }

        let expires = compute_expiry(asset.cache_control.as_deref(), self.default_max_age, Utc::now());

        debug!(
            url = %url,
            path = ?pathname,
            bytes = asset.body.len(),
            expires = %expires,
            "Stored asset"
        );

        Ok(AssetRecord::new(pathname, expires))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchedAsset;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct StaticFetcher {
        asset: FetchedAsset,
    }

    #[async_trait]
    impl Fetch for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<FetchedAsset, FetchError> {
            Ok(self.asset.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetch for FailingFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedAsset, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
                reason: "Not Found".into(),
            })
        }
    }

    fn downloader(dir: &std::path::Path, asset: FetchedAsset) -> AssetDownloader {
        AssetDownloader::new(
            Arc::new(StaticFetcher { asset }),
            dir,
            Duration::from_secs(604_800),
        )
    }

    fn png(cache_control: Option<&str>) -> FetchedAsset {
        FetchedAsset {
            content_type: Some("image/png".into()),
            cache_control: cache_control.map(str::to_owned),
            body: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    #[tokio::test]
    async fn test_download_writes_content_addressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path(), png(None));
        let url = Url::parse("https://example.com/logo.png").unwrap();

        let record = downloader.download(&url).await.unwrap();

        assert_eq!(record.pathname, downloader.path_for(&url, "png"));
        assert!(record.pathname.starts_with(dir.path()));
        assert_eq!(std::fs::read(&record.pathname).unwrap(), b"\x89PNG fake");
        // No temp file left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_same_url_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path(), png(None));
        let url = Url::parse("https://example.com/logo.png?v=1").unwrap();

        let first = downloader.download(&url).await.unwrap();
        let second = downloader.download(&url).await.unwrap();
        assert_eq!(first.pathname, second.pathname);

        let other = Url::parse("https://example.com/logo.png?v=2").unwrap();
        let third = downloader.download(&other).await.unwrap();
        assert_ne!(first.pathname, third.pathname);
    }

    #[tokio::test]
    async fn test_expiry_from_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path(), png(Some("public, max-age=120")));
        let url = Url::parse("https://example.com/logo.png").unwrap();

        let before = Utc::now();
        let record = downloader.download(&url).await.unwrap();
        let expected = before + chrono::Duration::seconds(120);
        assert!((record.expires - expected).num_milliseconds().abs() < 1000);
    }

    #[tokio::test]
    async fn test_expiry_defaults_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path(), png(None));
        let url = Url::parse("https://example.com/logo.png").unwrap();

        let before = Utc::now();
        let record = downloader.download(&url).await.unwrap();
        let expected = before + chrono::Duration::seconds(604_800);
        assert!((record.expires - expected).num_milliseconds().abs() < 1000);
    }

    #[tokio::test]
    async fn test_unknown_content_type_uses_bin() {
        let dir = tempfile::tempdir().unwrap();
        let asset = FetchedAsset {
            content_type: None,
            cache_control: None,
            body: Bytes::from_static(b"raw"),
        };
        let downloader = downloader(dir.path(), asset);
        let url = Url::parse("https://example.com/blob").unwrap();

        let record = downloader.download(&url).await.unwrap();
        assert_eq!(record.pathname.extension().unwrap(), "bin");
    }

    #[tokio::test]
    async fn test_temp_write_failure_leaves_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path(), png(None));
        let url = Url::parse("https://example.com/logo.png").unwrap();
        let target = downloader.path_for(&url, "png");

        // A directory squatting on the temp name makes the write fail.
        let mut temp_name = target.clone().into_os_string();
        temp_name.push(".tmp");
        std::fs::create_dir(&temp_name).unwrap();

        let err = downloader.download(&url).await.unwrap_err();
        match err {
            FetchError::Io { path, .. } => assert_eq!(path, PathBuf::from(&temp_name)),
            other => panic!("expected an io error, got {other:?}"),
        }
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = AssetDownloader::new(Arc::new(FailingFetcher), dir.path(), Duration::from_secs(1));
        let url = Url::parse("https://example.com/missing.png").unwrap();

        let err = downloader.download(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
