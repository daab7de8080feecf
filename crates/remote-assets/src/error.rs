use std::path::PathBuf;
use std::sync::Arc;

/// Errors raised while turning an identifier into a URL.
#[derive(Debug, thiserror::Error, Clone)]
pub enum AliasError {
    #[error("Asset failed to resolve: {identifier}")]
    NoMatch {
        identifier: String,
        #[source]
        source: url::ParseError,
    },

    #[error(
        "Asset \"{identifier}\" matched \"{pattern}\" but was transformed into an unresolvable URL: {candidate}"
    )]
    InvalidReplacement {
        identifier: String,
        pattern: String,
        candidate: String,
        #[source]
        source: url::ParseError,
    },
}

/// A single failed fetch attempt.
#[derive(Debug, thiserror::Error, Clone)]
pub enum FetchError {
    #[error("Asset \"{url}\" threw an error: {status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("Network error: {source}")]
    Network {
        #[from]
        source: Arc<reqwest::Error>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

// reqwest::Error is not Clone, so it travels behind an Arc.
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network {
            source: Arc::new(err),
        }
    }
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source: Arc::new(err),
        }
    }
}

/// Error returned by [`crate::RemoteAssets::resolve_id`].
#[derive(Debug, thiserror::Error, Clone)]
pub enum ResolveError {
    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error("Asset \"{url}\" failed to resolve after {attempts} attempts")]
    RetryExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("Download task for \"{url}\" did not complete: {reason}")]
    Task { url: String, reason: String },

    #[error("Cannot download \"{url}\" outside a tokio runtime: {reason}")]
    NoRuntime { url: String, reason: String },
}

/// Errors from reading or writing the cache index.
#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("Could not access cache index {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse cache index {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Invalid host configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("retry must be a positive integer, got {0}")]
    InvalidRetry(u32),

    #[error("Invalid alias pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
