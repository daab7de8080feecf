//! # Builder for Options
//!
//! Fluent construction of [`Options`] for hosts that configure the engine in code
//! rather than through JSON.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use remote_assets::{AliasRule, Options};
//!
//! let options = Options::builder()
//!     .with_retry_limit(5)
//!     .with_cache_location("/tmp/remote-assets")
//!     .with_cache_max_age(Duration::from_secs(3600))
//!     .with_alias_rule(AliasRule::new("^gh:(.+)$", "https://github.com/$1").unwrap())
//!     .with_user_agent("MyBuild/1.0")
//!     .build();
//!
//! assert_eq!(options.retry_limit, 5);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::config::{AliasRule, DEFAULT_MAX_AGE_SECS, ExpiryPolicy, HttpConfig, Options, absolute};

/// Builder for creating Options instances with a fluent API
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self {
            options: Options::default(),
        }
    }

    /// Set the total number of fetch attempts; values below 1 are raised to 1
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.options.retry_limit = limit.max(1);
        self
    }

    /// Enable or disable loading and persisting the cache index
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.options.cache_enabled = enabled;
        self
    }

    /// Set the cache directory, resolved against the working directory
    pub fn with_cache_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.options.cache_location = absolute(&location.into());
        self
    }

    /// Set the fallback lifetime; zero keeps the seven day default
    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.options.cache_max_age = if max_age.is_zero() {
            Duration::from_secs(DEFAULT_MAX_AGE_SECS)
        } else {
            max_age
        };
        self
    }

    /// Append an alias rule after the ones already configured
    pub fn with_alias_rule(mut self, rule: AliasRule) -> Self {
        self.options.alias_rules.push(rule);
        self
    }

    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.options.expiry_policy = policy;
        self
    }

    /// Replace the HTTP client settings
    pub fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.options.http = http;
        self
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.http.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.http.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header; invalid names or values are ignored
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.options.http.headers.insert(name, value);
        }
        self
    }

    /// Set whether to use system proxy settings
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.options.http.use_system_proxy = use_system_proxy;
        self
    }

    /// Build the Options instance
    pub fn build(self) -> Options {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
