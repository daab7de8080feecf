//! # Remote Assets
//!
//! Resolves `virtual:remote/<spec>` identifiers to local files. Each remote
//! resource is downloaded at most once per build, stored under a
//! content-addressed name and remembered in an `index.json` that survives
//! between builds.
//!
//! ## Features
//!
//! - Alias rules turning short identifiers into URLs
//! - Single-flight downloads: concurrent requests share one fetch
//! - Bounded retries
//! - Expiry taken from `Cache-Control: max-age`
//!
//! ## Example
//!
//! ```no_run
//! use remote_assets::{Options, RemoteAssets};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = RemoteAssets::new(Options::from_json(r#"{ "retry": 5 }"#)?)?;
//!
//! engine.build_start().await;
//! let _path = engine
//!     .resolve_id("virtual:remote/https://example.com/logo.svg")
//!     .await?;
//! engine.build_end().await;
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod builder;
pub mod cache;
pub mod config;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod mime;
pub mod retry;

pub use alias::AliasResolver;
pub use builder::OptionsBuilder;
pub use cache::{AssetRecord, CacheIndex, CacheIndexStore};
pub use config::{AliasRule, ExpiryPolicy, HttpConfig, Options, RemoteAssetsConfig};
pub use downloader::AssetDownloader;
pub use engine::{RemoteAssets, VIRTUAL_PREFIX, parse_virtual_id};
pub use error::{AliasError, CacheStoreError, ConfigError, FetchError, ResolveError};
pub use fetcher::{Fetch, FetchedAsset, HttpFetcher, create_client};
pub use retry::{RetryExhausted, RetryPolicy};
