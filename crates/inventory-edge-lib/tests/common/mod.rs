//! Shared helpers for driving the full stack against a mock Fauna endpoint.

use std::sync::Arc;

use http::Method;
use inventory_edge_lib::{EdgeConfig, EdgeContext, HttpResponse, IncomingRequest, MemorySecretStore};
use wiremock::MockServer;

pub const SECRET: &str = "fnAE-test-secret";

/// Context whose `fauna` backend points at `server`.
pub fn context_for(server: &MockServer) -> EdgeContext {
    context_for_origin(&server.uri())
}

pub fn context_for_origin(origin: &str) -> EdgeContext {
    let config = EdgeConfig {
        backend_origin: origin.to_string(),
        ..EdgeConfig::default()
    };
    let secrets = MemorySecretStore::new().with("FAUNA_ACCESS_KEY", SECRET);
    EdgeContext::fauna(config, reqwest::Client::new(), Arc::new(secrets))
        .expect("build edge context")
}

pub async fn send(ctx: &EdgeContext, method: Method, path: &str, body: &str) -> HttpResponse {
    let request = IncomingRequest::new(method, path)
        .with_body(body.as_bytes().to_vec())
        .with_request_id("req-integration");
    inventory_edge_lib::handle_request(ctx, request).await
}
