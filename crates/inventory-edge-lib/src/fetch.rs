//! Platform fetch primitive.
//!
//! [`Fetch`] is the lowest network seam: send one HTTP request to a named
//! backend and hand back the raw response. [`ReqwestFetch`] is the production
//! implementation; tests substitute recording or failing fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use http::header::{HeaderValue, CACHE_CONTROL};
use http::{HeaderMap, Method};
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

/// Caching hint forwarded to the platform fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheOverride {
    /// Leave caching to the platform defaults.
    #[default]
    None,
    /// Bypass any cache.
    Pass,
    /// Cache the response for the given number of seconds.
    Ttl(u32),
}

/// Transport-level options passed through to the fetch unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub cache_override: CacheOverride,
}

impl FetchOptions {
    /// Options requesting the response be cached for `seconds`.
    pub fn with_ttl(seconds: u32) -> Self {
        Self {
            cache_override: CacheOverride::Ttl(seconds),
        }
    }
}

/// A single outgoing request handed to the platform fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: String,
    /// Named upstream target selector.
    pub backend: String,
    pub options: FetchOptions,
}

/// Raw response returned by the platform fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Failures raised before an HTTP response was obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request named a backend that was never registered.
    #[error("unknown backend '{name}'")]
    UnknownBackend { name: String },

    /// The request URL or a backend origin could not be parsed.
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Wrapper for HTTP client errors (DNS, TCP, TLS, body read).
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// The platform's "send HTTP request, get HTTP response" primitive.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// [`Fetch`] backed by a shared `reqwest::Client` and a registry of named
/// backends.
///
/// Each backend maps a name to an origin; requests addressed to that backend
/// are sent to the origin regardless of the host in the request URL.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
    backends: HashMap<String, Url>,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            backends: HashMap::new(),
        }
    }

    /// Register `name` as a backend served by `origin`.
    pub fn with_backend(
        mut self,
        name: impl Into<String>,
        origin: &str,
    ) -> Result<Self, FetchError> {
        let origin = Url::parse(origin).map_err(|e| FetchError::InvalidUrl {
            url: origin.to_string(),
            message: e.to_string(),
        })?;
        self.backends.insert(name.into(), origin);
        Ok(self)
    }

    /// Resolve the effective URL for a request sent to `backend`.
    fn resolve(&self, url: &str, backend: &str) -> Result<Url, FetchError> {
        let origin = self
            .backends
            .get(backend)
            .ok_or_else(|| FetchError::UnknownBackend {
                name: backend.to_string(),
            })?;
        let requested = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let mut resolved = origin
            .join(requested.path())
            .map_err(|e| FetchError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        resolved.set_query(requested.query());
        Ok(resolved)
    }
}

fn cache_control(cache_override: CacheOverride) -> Option<HeaderValue> {
    match cache_override {
        CacheOverride::None => None,
        CacheOverride::Pass => Some(HeaderValue::from_static("no-store")),
        CacheOverride::Ttl(seconds) => HeaderValue::from_str(&format!("max-age={seconds}")).ok(),
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = self.resolve(&request.url, &request.backend)?;
        debug!(
            url = %url,
            backend = %request.backend,
            cache_override = ?request.options.cache_override,
            "sending upstream request"
        );

        let mut headers = request.headers;
        if let Some(value) = cache_control(request.options.cache_override) {
            headers.insert(CACHE_CONTROL, value);
        }

        let response = self
            .client
            .request(request.method, url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
