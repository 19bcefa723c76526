//! Request handler composing routing, query building, the database session
//! and response mapping.

use std::sync::Arc;

use http::{HeaderMap, Method};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::client::{Connector, FaunaConnector, SessionGuard};
use crate::config::{EdgeConfig, SecretStore};
use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchOptions, ReqwestFetch};
use crate::mapper::{map_error, map_success, page_not_found};
use crate::query::{ItemPayload, Operation, QuerySpec};
use crate::response::HttpResponse;
use crate::routing::{RouteMatch, RouteTable};

/// A request as handed over by a host.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Request path; any query string is ignored for routing.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Correlation id assigned by the host.
    pub request_id: String,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            request_id: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Shared, read-only state for handling requests.
#[derive(Clone)]
pub struct EdgeContext {
    connector: Arc<dyn Connector>,
    secrets: Arc<dyn SecretStore>,
    config: Arc<EdgeConfig>,
    routes: Arc<RouteTable>,
}

impl EdgeContext {
    pub fn new(
        connector: Arc<dyn Connector>,
        secrets: Arc<dyn SecretStore>,
        config: EdgeConfig,
    ) -> Self {
        Self {
            connector,
            secrets,
            config: Arc::new(config),
            routes: Arc::new(RouteTable::inventory()),
        }
    }

    /// Context talking to Fauna through a shared `reqwest` client, with the
    /// configured backend registered at the configured origin.
    pub fn fauna(
        config: EdgeConfig,
        client: reqwest::Client,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let fetch = ReqwestFetch::new(client)
            .with_backend(config.backend.clone(), &config.backend_origin)
            .map_err(|e| Error::InvalidUrl {
                url: config.backend_origin.clone(),
                message: e.to_string(),
            })?;
        Self::with_fetch(config, Arc::new(fetch), secrets)
    }

    /// Context talking to Fauna through an arbitrary [`Fetch`].
    pub fn with_fetch(
        config: EdgeConfig,
        fetch: Arc<dyn Fetch>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let connector = FaunaConnector::from_config(&config, fetch)?;
        Ok(Self::new(Arc::new(connector), secrets, config))
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

impl std::fmt::Debug for EdgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeContext")
            .field("config", &self.config)
            .field("routes", &self.routes.routes().len())
            .finish_non_exhaustive()
    }
}

/// Handle one request. Never fails: every error is mapped to a response.
pub async fn handle_request(ctx: &EdgeContext, request: IncomingRequest) -> HttpResponse {
    let Some(matched) = ctx.routes.match_route(&request.method, &request.path) else {
        debug!(
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
            "no route matched"
        );
        return page_not_found();
    };

    let operation = matched.operation;
    let span = info_span!(
        "inventory_request",
        request_id = %request.request_id,
        operation = %operation,
    );

    async move {
        let response = match execute(ctx, &matched, &request).await {
            Ok(response) => {
                let outcome = if response.status == 404 { "not_found" } else { "ok" };
                record_query(operation, outcome);
                response
            }
            Err(err) => {
                record_query(operation, outcome_label(&err));
                match &err {
                    Error::Query { status, code, .. } => {
                        warn!(status, code = %code, error = %err, "query rejected");
                    }
                    e if e.is_validation() => warn!(error = %err, "invalid request"),
                    _ => error!(error = %err, "request failed"),
                }
                map_error(&err, &request.request_id)
            }
        };
        info!(status = response.status, "request handled");
        response
    }
    .instrument(span)
    .await
}

async fn execute(
    ctx: &EdgeContext,
    matched: &RouteMatch,
    request: &IncomingRequest,
) -> Result<HttpResponse> {
    let operation = matched.operation;
    let key = &ctx.config.secret_key;
    let secret = ctx
        .secrets
        .get(key)
        .ok_or_else(|| Error::MissingCredential { key: key.clone() })?;

    let options = match operation {
        Operation::Health => FetchOptions::with_ttl(ctx.config.health_cache_ttl),
        _ => FetchOptions::default(),
    };
    let mut session = SessionGuard::open(ctx.connector.as_ref(), &secret, options);

    let id = if operation.is_id_scoped() {
        Some(matched.id()?)
    } else {
        None
    };
    let spec = build_query(operation, id.as_deref().unwrap_or_default(), &request.body)?;
    let success = session.query(&spec).await?;
    map_success(operation, id.as_deref(), success)
}

/// Build the query for `operation`; `id` is ignored by operations that take
/// no id, `body` by those that take no payload.
pub fn build_query(operation: Operation, id: &str, body: &[u8]) -> Result<QuerySpec> {
    let spec = match operation {
        Operation::Health => QuerySpec::health(),
        Operation::List => QuerySpec::list(),
        Operation::GetById => QuerySpec::get_by_id(id),
        Operation::Create => QuerySpec::create(ItemPayload::from_body(body)?),
        Operation::Update => QuerySpec::update(id, ItemPayload::from_body(body)?),
        Operation::Delete => QuerySpec::delete(id),
    };
    Ok(spec)
}

fn outcome_label(error: &Error) -> &'static str {
    match error {
        Error::Query { .. } => "query_error",
        Error::Network { .. } => "network_error",
        Error::InvalidBody { .. } | Error::InvalidPathParameter { .. } => "invalid_request",
        Error::MissingCredential { .. } | Error::InvalidCredential => "credential_error",
        _ => "error",
    }
}

fn record_query(operation: Operation, outcome: &'static str) {
    metrics::counter!(
        "inventory_queries_total",
        "operation" => operation.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySecretStore;
    use crate::mapper::{ID_NOT_FOUND, PAGE_NOT_FOUND};
    use crate::response::CONTENT_TYPE_PROBLEM;
    use crate::test_utils::{FailingFetch, InMemoryDatabase};
    use serde_json::{json, Value};

    fn context(db: &InMemoryDatabase) -> EdgeContext {
        let secrets = MemorySecretStore::new().with("FAUNA_ACCESS_KEY", "secret");
        EdgeContext::new(Arc::new(db.clone()), Arc::new(secrets), EdgeConfig::default())
    }

    async fn send(ctx: &EdgeContext, method: Method, path: &str, body: &str) -> HttpResponse {
        let request = IncomingRequest::new(method, path)
            .with_body(body.as_bytes().to_vec())
            .with_request_id("req-test");
        handle_request(ctx, request).await
    }

    fn created_id(body: &str) -> String {
        let json = body
            .strip_prefix("A new item has been added to the inventory: ")
            .expect("create confirmation");
        let doc: Value = serde_json::from_str(json).unwrap();
        doc["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_returns_hello_world() {
        let db = InMemoryDatabase::new();
        let response = send(&context(&db), Method::GET, "/", "").await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\"Hello World\"");
    }

    #[tokio::test]
    async fn health_requests_cache_ttl() {
        let db = InMemoryDatabase::new();
        send(&context(&db), Method::GET, "/", "").await;
        send(&context(&db), Method::GET, "/inventory", "").await;
        assert_eq!(
            db.session_options(),
            vec![FetchOptions::with_ttl(60), FetchOptions::default()]
        );
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let db = InMemoryDatabase::new();
        let ctx = context(&db);
        let response = send(
            &ctx,
            Method::POST,
            "/inventory",
            r#"{"item":"pen","quantity":10,"price":1.5}"#,
        )
        .await;
        assert!((200..300).contains(&response.status));
        let id = created_id(&response.body);

        let response = send(&ctx, Method::GET, &format!("/inventory/{id}"), "").await;
        assert_eq!(response.status, 200);
        let doc: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(doc["item"], json!("pen"));
        assert_eq!(doc["quantity"], json!(10));
        assert_eq!(doc["price"], json!(1.5));
    }

    #[tokio::test]
    async fn unmatched_route_never_opens_a_session() {
        let db = InMemoryDatabase::new();
        let response = send(&context(&db), Method::PATCH, "/inventory/1", "").await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, PAGE_NOT_FOUND);
        assert_eq!(db.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn update_missing_id_is_404() {
        let db = InMemoryDatabase::new();
        let response = send(
            &context(&db),
            Method::PUT,
            "/inventory/does-not-exist",
            r#"{"item":"x","quantity":1,"price":1}"#,
        )
        .await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, ID_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_is_400_and_releases_session() {
        let db = InMemoryDatabase::new();
        let response = send(&context(&db), Method::POST, "/inventory", "{\"item\":").await;
        assert_eq!(response.status, 400);
        assert_eq!(response.content_type(), Some(CONTENT_TYPE_PROBLEM));
        assert_eq!(db.sessions_opened(), 1);
        assert_eq!(db.sessions_closed(), 1);
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn invalid_path_encoding_is_400() {
        let db = InMemoryDatabase::new();
        let response = send(&context(&db), Method::GET, "/inventory/%FF", "").await;
        assert_eq!(response.status, 400);
        assert_eq!(db.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn query_error_passes_status_and_summary() {
        let db = InMemoryDatabase::new();
        db.fail_with_query_error(403, "forbidden", "error: Insufficient privileges");
        let response = send(&context(&db), Method::GET, "/inventory", "").await;
        assert_eq!(response.status, 403);
        assert_eq!(response.body, "error: Insufficient privileges");
        assert_eq!(db.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn missing_credential_is_500_without_session() {
        let db = InMemoryDatabase::new();
        let ctx = EdgeContext::new(
            Arc::new(db.clone()),
            Arc::new(MemorySecretStore::new()),
            EdgeConfig::default(),
        );
        let response = send(&ctx, Method::GET, "/", "").await;
        assert_eq!(response.status, 500);
        assert_eq!(db.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn network_failure_is_500() {
        let secrets = MemorySecretStore::new().with("FAUNA_ACCESS_KEY", "secret");
        let ctx = EdgeContext::with_fetch(
            EdgeConfig::default(),
            Arc::new(FailingFetch),
            Arc::new(secrets),
        )
        .unwrap();
        let response = send(&ctx, Method::GET, "/inventory/1", "").await;
        assert_eq!(response.status, 500);
        assert!(response
            .body
            .contains("The network connection encountered a problem."));
    }

    #[tokio::test]
    async fn every_handled_request_opens_and_closes_one_session() {
        let db = InMemoryDatabase::new();
        let ctx = context(&db);
        let requests = [
            (Method::GET, "/", ""),
            (Method::GET, "/inventory", ""),
            (Method::GET, "/inventory/missing", ""),
            (Method::POST, "/inventory", r#"{"item":"a","quantity":1,"price":1}"#),
            (Method::PUT, "/inventory/missing", "{}"),
            (Method::DELETE, "/inventory/missing", ""),
            (Method::POST, "/inventory", "not json"),
        ];
        for (method, path, body) in requests.iter().cloned() {
            send(&ctx, method, path, body).await;
        }
        assert_eq!(db.sessions_opened(), requests.len());
        assert_eq!(db.sessions_closed(), requests.len());
    }

    #[test]
    fn build_query_binds_decoded_id() {
        let spec = build_query(Operation::Delete, "a b", b"").unwrap();
        assert_eq!(spec.param("id"), Some(&json!("a b")));
        assert!(build_query(Operation::Update, "1", b"[").is_err());
    }
}
