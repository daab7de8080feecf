//! # Resolution Engine
//!
//! Turns `virtual:remote/<spec>` identifiers into paths of locally cached
//! files. Each canonical URL moves through three states in the index:
//!
//! ```text
//!  Unseen ──claim──▶ Pending ──ok──▶ Resolved
//!    ▲                  │
//!    └──────error───────┘
//! ```
//!
//! A Pending entry is registered under the index lock before the download
//! task is spawned, so concurrent requests for the same URL always attach to
//! the same download.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use url::Url;

use crate::alias::AliasResolver;
use crate::cache::{AssetRecord, CacheIndex, CacheIndexStore};
use crate::config::{ExpiryPolicy, Options};
use crate::downloader::AssetDownloader;
use crate::error::{CacheStoreError, FetchError, ResolveError};
use crate::fetcher::{Fetch, HttpFetcher};
use crate::retry::RetryPolicy;

/// Prefix of the identifiers this engine handles.
pub const VIRTUAL_PREFIX: &str = "virtual:remote/";

type DownloadResult = Result<AssetRecord, ResolveError>;
type SharedDownload = Shared<BoxFuture<'static, DownloadResult>>;

enum CacheEntry {
    Resolved(AssetRecord),
    Pending {
        id: u64,
        download: SharedDownload,
        /// Expired record being refetched; restored if the refetch fails.
        previous: Option<AssetRecord>,
    },
}

enum Claim {
    Ready(AssetRecord),
    Wait(SharedDownload),
}

/// Returns the `<spec>` part of a virtual identifier, or `None` when the
/// identifier belongs to someone else.
pub fn parse_virtual_id(id: &str) -> Option<&str> {
    id.strip_prefix(VIRTUAL_PREFIX)
        .filter(|spec| !spec.is_empty() && !spec.contains('\n'))
}

/// The resolution engine. Cheap to clone; clones share one cache index.
#[derive(Clone)]
pub struct RemoteAssets {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    options: Options,
    aliases: AliasResolver,
    downloader: AssetDownloader,
    store: CacheIndexStore,
    retry: RetryPolicy,
    entries: Mutex<HashMap<String, CacheEntry>>,
    next_id: AtomicU64,
}

impl RemoteAssets {
    /// Creates an engine that fetches over HTTP with `options.http`.
    pub fn new(options: Options) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::from_config(&options.http)?;
        Ok(Self::with_fetcher(options, Arc::new(fetcher)))
    }

    /// Creates an engine on top of a custom [`Fetch`] implementation.
    pub fn with_fetcher(options: Options, fetcher: Arc<dyn Fetch>) -> Self {
        let downloader = AssetDownloader::new(
            fetcher,
            options.cache_location.clone(),
            options.cache_max_age,
        );
        let inner = EngineInner {
            aliases: AliasResolver::new(options.alias_rules.clone()),
            store: CacheIndexStore::new(options.cache_location.clone()),
            retry: RetryPolicy::new(options.retry_limit),
            downloader,
            options,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Build start hook: merges the persisted index into memory when caching
    /// is enabled. Entries already present in memory win.
    pub async fn build_start(&self) {
        if !self.inner.options.cache_enabled {
            return;
        }

        let index = self.inner.store.load().await;
        let mut restored = 0usize;
        {
            let mut entries = self.inner.entries.lock();
            for (url, record) in index {
                if let Entry::Vacant(slot) = entries.entry(url) {
                    slot.insert(CacheEntry::Resolved(record));
                    restored += 1;
                }
            }
        }
        info!(restored, "Restored cache index");
    }

    /// Build end hook: persists the index when caching is enabled. A failed
    /// write is logged and otherwise ignored.
    pub async fn build_end(&self) {
        if !self.inner.options.cache_enabled {
            return;
        }

        match self.persist().await {
            Ok(entries) => info!(entries, path = ?self.inner.store.index_path(), "Wrote cache index"),
            Err(e) => warn!(error = %e, "Could not write cache index"),
        }
    }

    /// Waits for every pending download, then writes all resolved entries.
    pub async fn persist(&self) -> Result<usize, CacheStoreError> {
        let (mut index, pending) = {
            let entries = self.inner.entries.lock();
            let mut index = CacheIndex::new();
            let mut pending = Vec::new();
            for (url, entry) in entries.iter() {
                match entry {
                    CacheEntry::Resolved(record) => {
                        index.insert(url.clone(), record.clone());
                    }
                    CacheEntry::Pending {
                        download, previous, ..
                    } => {
                        pending.push((url.clone(), download.clone(), previous.clone()));
                    }
                }
            }
            (index, pending)
        };

        if !pending.is_empty() {
            debug!(count = pending.len(), "Waiting for pending downloads");
        }
        let settled = join_all(
            pending
                .into_iter()
                .map(|(url, download, previous)| async move { (url, download.await, previous) }),
        )
        .await;

        for (url, result, previous) in settled {
            match (result, previous) {
                (Ok(record), _) | (Err(_), Some(record)) => {
                    index.insert(url, record);
                }
                (Err(_), None) => {}
            }
        }

        self.inner.store.persist(&index).await
    }

    /// Resolve hook. `Ok(None)` means the identifier is not a
    /// `virtual:remote/` identifier and another resolver should handle it.
    ///
    /// Downloads are spawned on the current tokio runtime. Called from any
    /// other executor, a URL that needs downloading fails with
    /// [`ResolveError::NoRuntime`].
    pub async fn resolve_id(&self, id: &str) -> Result<Option<String>, ResolveError> {
        let Some(spec) = parse_virtual_id(id) else {
            return Ok(None);
        };

        let url = self.inner.aliases.resolve(spec)?;

        let record = match self.inner.claim(&url)? {
            Claim::Ready(record) => {
                debug!(url = %url, "Cache hit");
                record
            }
            Claim::Wait(download) => download.await?,
        };

        Ok(Some(record.output_path(&url)))
    }

    /// The resolved record for a canonical URL, if any.
    pub fn lookup(&self, url: &str) -> Option<AssetRecord> {
        match self.inner.entries.lock().get(url) {
            Some(CacheEntry::Resolved(record)) => Some(record.clone()),
            _ => None,
        }
    }

    /// Number of URLs in the index, pending ones included.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EngineInner {
    fn is_stale(&self, record: &AssetRecord) -> bool {
        self.options.expiry_policy == ExpiryPolicy::Refetch && record.is_expired()
    }

    /// Returns the usable record or the download to wait on, registering a
    /// new download when there is neither.
    fn claim(self: &Arc<Self>, url: &Url) -> Result<Claim, ResolveError> {
        let key = url.as_str();
        let mut entries = self.entries.lock();

        let previous = match entries.get(key) {
            Some(CacheEntry::Resolved(record)) if !self.is_stale(record) => {
                return Ok(Claim::Ready(record.clone()));
            }
            Some(CacheEntry::Pending { download, .. }) => return Ok(Claim::Wait(download.clone())),
            Some(CacheEntry::Resolved(record)) => {
                debug!(url = %url, expires = %record.expires, "Cached asset expired");
                Some(record.clone())
            }
            None => None,
        };

        let runtime = Handle::try_current().map_err(|e| ResolveError::NoRuntime {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let download = self.spawn_download(&runtime, id, url.clone());
        entries.insert(
            key.to_owned(),
            CacheEntry::Pending {
                id,
                download: download.clone(),
                previous,
            },
        );
        Ok(Claim::Wait(download))
    }

    /// The download runs in its own task so it finishes even if every
    /// requester goes away.
    fn spawn_download(self: &Arc<Self>, runtime: &Handle, id: u64, url: Url) -> SharedDownload {
        let inner = Arc::clone(self);
        let task_url = url.clone();
        let handle = runtime.spawn(async move {
            let result = inner.download_with_retry(&task_url).await;
            inner.settle(&task_url, id, &result);
            result
        });

        // Weak: the index owns this future.
        let weak: Weak<Self> = Arc::downgrade(self);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let result = Err(ResolveError::Task {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                    if let Some(inner) = weak.upgrade() {
                        inner.settle(&url, id, &result);
                    }
                    result
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn download_with_retry(&self, url: &Url) -> DownloadResult {
        let limit = self.retry.limit();
        self.retry
            .run(|attempt| async move {
                let result = self.downloader.download(url).await;
                if let Err(e) = &result {
                    warn!(url = %url, attempt, limit, error = %e, "Download attempt failed");
                }
                result
            })
            .await
            .map_err(|exhausted| ResolveError::RetryExhausted {
                url: url.to_string(),
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
    }

    /// Replaces the Pending entry `id` with its outcome. Failures are not
    /// remembered; a failed refetch puts the expired record back.
    fn settle(&self, url: &Url, id: u64, result: &DownloadResult) {
        let key = url.as_str();
        let mut entries = self.entries.lock();

        let previous = match entries.get_mut(key) {
            Some(CacheEntry::Pending {
                id: pending,
                previous,
                ..
            }) if *pending == id => previous.take(),
            _ => return,
        };

        match result {
            Ok(record) => {
                entries.insert(key.to_owned(), CacheEntry::Resolved(record.clone()));
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Asset could not be downloaded");
                match previous {
                    Some(record) => {
                        entries.insert(key.to_owned(), CacheEntry::Resolved(record));
                    }
                    None => {
                        entries.remove(key);
                    }
                }
            }
        }
    }
}
