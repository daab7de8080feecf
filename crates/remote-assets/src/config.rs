use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::cache::INDEX_FILE_NAME;
use crate::error::ConfigError;

/// Name used for the default cache directory.
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Default retry budget (total attempts).
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Seven days.
pub const DEFAULT_MAX_AGE_SECS: u64 = 604_800;

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A pattern/replacement pair applied to identifiers that are not URLs.
#[derive(Debug, Clone)]
pub struct AliasRule {
    pub pattern: Regex,
    /// Replacement in `regex` syntax (`$1`, `${name}`). A group reference
    /// followed by name characters needs braces: `$1_v2` reads as the group
    /// `1_v2`, write `${1}_v2`.
    pub replacement: String,
}

impl AliasRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }
}

/// What to do with a resolved record whose `expires` instant has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Keep serving the cached file; expiry is bookkeeping only.
    #[default]
    Ignore,
    /// Treat an expired record as a miss and download again.
    Refetch,
}

/// Settings for the underlying HTTP client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Extra headers sent with every request
    pub headers: HeaderMap,

    /// Whether to honour the system proxy settings (`HTTP_PROXY` and friends)
    pub use_system_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpConfig::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl HttpConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers
    }
}

/// Engine options, read once when the engine is constructed.
#[derive(Debug, Clone)]
pub struct Options {
    /// Total fetch attempts per resolution, at least 1.
    pub retry_limit: u32,
    /// Whether the index is loaded at build start and persisted at build end.
    pub cache_enabled: bool,
    /// Directory holding `index.json` and the downloaded files.
    pub cache_location: PathBuf,
    /// Lifetime given to responses without a usable `Cache-Control: max-age`.
    pub cache_max_age: Duration,
    /// Evaluated in order, first match wins.
    pub alias_rules: Vec<AliasRule>,
    pub expiry_policy: ExpiryPolicy,
    pub http: HttpConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            cache_enabled: true,
            cache_location: default_cache_location(),
            cache_max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            alias_rules: Vec::new(),
            expiry_policy: ExpiryPolicy::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Options {
    pub fn builder() -> crate::builder::OptionsBuilder {
        crate::builder::OptionsBuilder::new()
    }

    /// Parses the host's JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RemoteAssetsConfig = serde_json::from_str(json)?;
        Self::try_from(config)
    }

    /// Location of the persisted index document.
    pub fn index_path(&self) -> PathBuf {
        self.cache_location.join(INDEX_FILE_NAME)
    }
}

/// `node_modules/.cache/<package>` under the working directory.
pub fn default_cache_location() -> PathBuf {
    absolute(
        &Path::new("node_modules")
            .join(".cache")
            .join(PACKAGE_NAME),
    )
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Configuration as handed over by the host build tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAssetsConfig {
    #[serde(default)]
    pub retry: Option<u32>,
    #[serde(default)]
    pub cache: Option<CacheSetting>,
    #[serde(default)]
    pub aliases: Vec<AliasConfig>,
    #[serde(default)]
    pub expiry: Option<ExpiryPolicy>,
}

/// `cache: true | false | { location, maxAge }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CacheSetting {
    Enabled(bool),
    Custom(CacheLocationConfig),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheLocationConfig {
    #[serde(default)]
    pub location: Option<PathBuf>,
    /// Seconds; 0 means "use the default".
    #[serde(default)]
    pub max_age: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AliasConfig {
    pub pattern: String,
    pub replacement: String,
}

impl TryFrom<RemoteAssetsConfig> for Options {
    type Error = ConfigError;

    fn try_from(config: RemoteAssetsConfig) -> Result<Self, Self::Error> {
        let mut builder = Options::builder();

        if let Some(retry) = config.retry {
            if retry == 0 {
                return Err(ConfigError::InvalidRetry(retry));
            }
            builder = builder.with_retry_limit(retry);
        }

        match config.cache {
            None | Some(CacheSetting::Enabled(true)) => {}
            Some(CacheSetting::Enabled(false)) => builder = builder.with_caching_enabled(false),
            Some(CacheSetting::Custom(custom)) => {
                if let Some(location) = custom.location {
                    builder = builder.with_cache_location(location);
                }
                if let Some(max_age) = custom.max_age {
                    builder = builder.with_cache_max_age(Duration::from_secs(max_age));
                }
            }
        }

        for alias in config.aliases {
            builder = builder.with_alias_rule(AliasRule::new(&alias.pattern, alias.replacement)?);
        }

        if let Some(policy) = config.expiry {
            builder = builder.with_expiry_policy(policy);
        }

        Ok(builder.build())
    }
}
