//! Request correlation and HTTP metrics middleware.
//!
//! [`MetricsLayer`] extracts `X-Request-ID` or generates a UUID v7, stores it
//! as a [`RequestId`] request extension for the handler, echoes it on the
//! response and records:
//! - `http_requests_total`: counter by method, route, status bucket
//! - `http_request_duration_seconds`: histogram by method, route
//!
//! The `route` label is the matched route template (`/inventory/{id}`), never
//! the raw path, so item ids do not become label values.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use inventory_edge_lib::RouteTable;
use once_cell::sync::Lazy;
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::{info_span, Span};
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

static ROUTES: Lazy<RouteTable> = Lazy::new(RouteTable::inventory);

/// Request correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new UUID v7 request id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Take the `X-Request-ID` header if present and non-empty, else generate one.
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RequestId::from)
        .unwrap_or_else(RequestId::generate)
}

/// Metric label for a request path: the template of the first route pattern
/// matching it regardless of method, or `unmatched`.
pub fn route_label(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    ROUTES
        .routes()
        .iter()
        .find(|route| route.pattern.matches(path).is_some())
        .map(|route| route.pattern.to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

fn status_bucket(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Tower layer adding request correlation and HTTP metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: http_body::Body + Send + 'static,
    ResBody: http_body::Body + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let route = route_label(req.uri().path());

        let request_id = extract_or_generate_request_id(req.headers());
        req.extensions_mut().insert(request_id.clone());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            route = %route,
        );
        span.in_scope(|| tracing::debug!(path = %req.uri().path(), "handling request"));

        MetricsFuture {
            inner: self.inner.call(req),
            start,
            method,
            route,
            request_id,
            span,
        }
    }
}

pin_project! {
    /// Future wrapper that tags the response and records metrics on completion.
    pub struct MetricsFuture<F> {
        #[pin]
        inner: F,
        start: Instant,
        method: String,
        route: String,
        request_id: RequestId,
        span: Span,
    }
}

impl<F, ResBody, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();

        let mut result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        let elapsed = this.start.elapsed();
        let status_label = match &mut result {
            Ok(response) => {
                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response.headers_mut().insert(X_REQUEST_ID.clone(), value);
                }
                let status = response.status().as_u16();
                tracing::info!(
                    status,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "request completed"
                );
                status_bucket(status)
            }
            Err(_) => {
                tracing::error!(latency_ms = elapsed.as_secs_f64() * 1000.0, "request failed");
                "5xx"
            }
        };

        metrics::counter!(
            "http_requests_total",
            "method" => this.method.clone(),
            "route" => this.route.clone(),
            "status" => status_label
        )
        .increment(1);
        metrics::histogram!(
            "http_request_duration_seconds",
            "method" => this.method.clone(),
            "route" => this.route.clone()
        )
        .record(elapsed.as_secs_f64());

        Poll::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_generated_when_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_or_generate_request_id(&headers).as_str().len(), 36);

        headers.insert("x-request-id", HeaderValue::from_static("  "));
        assert_eq!(extract_or_generate_request_id(&headers).as_str().len(), 36);
    }

    #[test]
    fn request_id_taken_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-ID", HeaderValue::from_static("edge-123"));
        assert_eq!(extract_or_generate_request_id(&headers).as_str(), "edge-123");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn route_labels_collapse_ids() {
        assert_eq!(route_label("/"), "/");
        assert_eq!(route_label("/inventory/"), "/inventory");
        assert_eq!(route_label("/inventory?x=1"), "/inventory");
        assert_eq!(route_label("/inventory/abc"), "/inventory/{id}");
        assert_eq!(route_label("/inventory/xyz/"), "/inventory/{id}");
        assert_eq!(route_label("/wp-admin"), "unmatched");
    }

    #[test]
    fn route_labels_follow_the_edge_route_table() {
        let edge = inventory_edge_lib::EdgeContext::new(
            std::sync::Arc::new(inventory_edge_lib::test_utils::InMemoryDatabase::new()),
            std::sync::Arc::new(inventory_edge_lib::MemorySecretStore::new()),
            inventory_edge_lib::EdgeConfig::default(),
        );
        for route in edge.routes().routes() {
            let template = route.pattern.to_string();
            let path = template.replace("{id}", "7");
            assert_eq!(route_label(&path), template);
        }
    }

    #[test]
    fn status_buckets() {
        assert_eq!(status_bucket(201), "2xx");
        assert_eq!(status_bucket(404), "4xx");
        assert_eq!(status_bucket(502), "5xx");
        assert_eq!(status_bucket(99), "other");
    }
}
