//! HTTP host for the inventory edge router.
//!
//! Every request reaches a single fallback handler that hands it to
//! [`inventory_edge_lib::handle_request`]; the route table lives in the
//! library, so this crate only provides HTTP glue:
//!
//! - [`AppState`]: the shared edge context
//! - [`logging`]: structured JSON or text logging
//! - [`metrics`]: Prometheus recorder and its dedicated router
//! - [`middleware`]: request ids and HTTP metrics

#![deny(warnings)]

pub mod logging;
pub mod metrics;
pub mod middleware;
mod state;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use inventory_edge_lib::mapper::page_not_found;
use inventory_edge_lib::{handle_request, HttpResponse, IncomingRequest, ProblemDetails};
use tracing::{debug, warn};

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, metrics_router, MetricsConfig, MetricsError};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId};
pub use state::{AppState, DEFAULT_MAX_BODY_BYTES};

/// Public router: every path and method goes to the edge handler.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(edge_handler)
        .layer(MetricsLayer)
        .with_state(state)
}

async fn edge_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = parts
        .extensions
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| extract_or_generate_request_id(&parts.headers));

    // Unmatched requests get the fallback whatever their body size.
    if state
        .edge()
        .routes()
        .match_route(&parts.method, parts.uri.path())
        .is_none()
    {
        debug!(request_id = %request_id, path = %parts.uri.path(), "no route matched");
        return into_axum(page_not_found());
    }

    let body = match to_bytes(body, state.max_body_bytes()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "request body rejected");
            let problem = ProblemDetails::new(
                "/problems/payload-too-large",
                "Payload Too Large",
                StatusCode::PAYLOAD_TOO_LARGE,
            )
            .with_detail(format!(
                "request body exceeds {} bytes",
                state.max_body_bytes()
            ))
            .with_request_id(request_id.as_str());
            return into_axum(problem.into_response());
        }
    };

    let incoming = IncomingRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body: body.to_vec(),
        request_id: request_id.to_string(),
    };
    into_axum(handle_request(state.edge(), incoming).await)
}

/// Convert a library response into an axum response.
pub fn into_axum(response: HttpResponse) -> Response {
    let status = response.status_code();
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = status;
    *out.headers_mut() = response.headers;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_axum_keeps_status_and_headers() {
        let response = into_axum(HttpResponse::text(404, "id not found"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
    }
}
