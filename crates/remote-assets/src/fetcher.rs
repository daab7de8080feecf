//! HTTP access for the download executor.
//!
//! [`Fetch`] is the seam between the engine and the network: the engine only
//! needs the body and two headers of a successful GET.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName};
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::error::FetchError;

/// A successful response, reduced to what the cache needs.
#[derive(Debug, Clone, Default)]
pub struct FetchedAsset {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs one GET. Non-2xx responses are errors.
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset, FetchError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &HttpConfig) -> Result<Client, FetchError> {
    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.use_system_proxy {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(FetchError::from)
}

/// [`Fetch`] over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self::new(create_client(config)?))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset, FetchError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_owned(),
            });
        }

        let (content_type, cache_control) = extract_cache_headers(response.headers());
        let body = response.bytes().await?;

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "Fetched asset");
        Ok(FetchedAsset {
            content_type,
            cache_control,
            body,
        })
    }
}

/// Extract `Content-Type` and `Cache-Control` from a response
pub fn extract_cache_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    (header(CONTENT_TYPE), header(CACHE_CONTROL))
}
