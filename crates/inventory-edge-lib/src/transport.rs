//! Transport adapter between the database client and the platform fetch.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use reqwest::Url;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchOptions, FetchRequest};

/// Upstream path for query requests, resolved against the base URL.
pub const QUERY_PATH: &str = "/query/1";

/// Resolve [`QUERY_PATH`] against a base URL.
pub fn resolve_query_url(base_url: &str) -> Result<String> {
    Url::parse(base_url)
        .and_then(|base| base.join(QUERY_PATH))
        .map(String::from)
        .map_err(|e| Error::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })
}

/// Request handed to a transport by the database client.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// JSON payload, serialized by the transport.
    pub data: Value,
    pub headers: HeaderMap,
    pub method: Method,
}

/// Response returned by a transport. Non-2xx statuses are normal responses.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
}

/// Generic "send HTTP request, get HTTP response" contract consumed by the
/// database client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Release transport resources.
    fn close(&self) {}
}

/// [`Transport`] over a platform [`Fetch`], targeting a fixed query URL on a
/// named backend.
pub struct FetchTransport {
    url: String,
    backend: String,
    options: FetchOptions,
    fetch: Arc<dyn Fetch>,
}

impl FetchTransport {
    /// Build a transport for `base_url`, resolving [`QUERY_PATH`] against it.
    pub fn new(
        base_url: &str,
        backend: impl Into<String>,
        options: FetchOptions,
        fetch: Arc<dyn Fetch>,
    ) -> Result<Self> {
        let url = resolve_query_url(base_url)?;
        Ok(Self::with_query_url(url, backend, options, fetch))
    }

    /// Build a transport for an already resolved query URL.
    pub(crate) fn with_query_url(
        url: String,
        backend: impl Into<String>,
        options: FetchOptions,
        fetch: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            url,
            backend: backend.into(),
            options,
            fetch,
        }
    }

    /// The resolved upstream query URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn options(&self) -> FetchOptions {
        self.options
    }
}

impl std::fmt::Debug for FetchTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchTransport")
            .field("url", &self.url)
            .field("backend", &self.backend)
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl Transport for FetchTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut headers = request.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = serde_json::to_string(&request.data)?;

        let response = self
            .fetch
            .fetch(FetchRequest {
                url: self.url.clone(),
                method: request.method,
                headers,
                body,
                backend: self.backend.clone(),
                options: self.options,
            })
            .await
            .map_err(Error::network)?;

        Ok(TransportResponse {
            status: response.status,
            body: response.body,
            headers: response.headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::CacheOverride;
    use crate::test_utils::{FailingFetch, RecordingFetch};
    use serde_json::json;
    use std::error::Error as _;

    fn request_with_headers(headers: HeaderMap) -> TransportRequest {
        TransportRequest {
            data: json!({"query": "1 + 1"}),
            headers,
            method: Method::POST,
        }
    }

    #[test]
    fn new_resolves_query_path_against_base() {
        let fetch = Arc::new(RecordingFetch::ok(200, "{}"));
        let transport = FetchTransport::new(
            "https://db.fauna.com",
            "fauna",
            FetchOptions::default(),
            fetch.clone(),
        )
        .unwrap();
        assert_eq!(transport.url(), "https://db.fauna.com/query/1");

        let transport = FetchTransport::new(
            "https://db.fauna.com/some/prefix",
            "fauna",
            FetchOptions::default(),
            fetch,
        )
        .unwrap();
        assert_eq!(transport.url(), "https://db.fauna.com/query/1");
    }

    #[test]
    fn new_rejects_invalid_base_url() {
        let fetch = Arc::new(RecordingFetch::ok(200, "{}"));
        let err = FetchTransport::new("db.fauna.com", "fauna", FetchOptions::default(), fetch)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn send_forwards_backend_options_and_body() {
        let fetch = Arc::new(RecordingFetch::ok(200, r#"{"data":2}"#));
        let transport = FetchTransport::new(
            "https://db.fauna.com",
            "fauna",
            FetchOptions::with_ttl(60),
            fetch.clone(),
        )
        .unwrap();

        let response = transport
            .send(request_with_headers(HeaderMap::new()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"data":2}"#);

        let sent = fetch.last_request().expect("request recorded");
        assert_eq!(sent.url, "https://db.fauna.com/query/1");
        assert_eq!(sent.backend, "fauna");
        assert_eq!(sent.options.cache_override, CacheOverride::Ttl(60));
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.body, r#"{"query":"1 + 1"}"#);
    }

    #[tokio::test]
    async fn content_type_is_asserted_last() {
        let fetch = Arc::new(RecordingFetch::ok(200, "{}"));
        let transport =
            FetchTransport::new("https://db.fauna.com", "fauna", FetchOptions::default(), fetch.clone())
                .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.insert("x-format", HeaderValue::from_static("simple"));
        transport.send(request_with_headers(headers)).await.unwrap();

        let sent = fetch.last_request().unwrap();
        assert_eq!(sent.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(sent.headers.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(sent.headers.get("X-Format").unwrap(), "simple");
    }

    #[tokio::test]
    async fn http_error_status_is_a_normal_response() {
        let fetch = Arc::new(RecordingFetch::ok(503, "unavailable"));
        let transport =
            FetchTransport::new("https://db.fauna.com", "fauna", FetchOptions::default(), fetch)
                .unwrap();

        let response = transport
            .send(request_with_headers(HeaderMap::new()))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "unavailable");
    }

    #[tokio::test]
    async fn fetch_failure_becomes_network_error() {
        let transport = FetchTransport::new(
            "https://db.fauna.com",
            "fauna",
            FetchOptions::default(),
            Arc::new(FailingFetch),
        )
        .unwrap();

        let err = transport
            .send(request_with_headers(HeaderMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
        assert!(err.source().is_some());
    }
}
