//! Database client: per-request sessions over a [`Transport`].
//!
//! A [`Connector`] opens one [`Session`] per request, bound to the request's
//! credential and a fresh transport. Handlers hold the session through a
//! [`SessionGuard`], which releases it exactly once when it goes out of scope,
//! whichever way the handler returns.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderValue, AUTHORIZATION};
use http::{HeaderMap, Method};
use serde_json::Value;
use tracing::debug;

use crate::config::EdgeConfig;
use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchOptions};
use crate::query::QuerySpec;
use crate::transport::{resolve_query_url, FetchTransport, Transport, TransportRequest, TransportResponse};

/// Response format requested from the database (plain JSON, no type tags).
const RESPONSE_FORMAT: &str = "simple";

/// Successful query outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuccess {
    /// The query's result value; `null` when an optional lookup found nothing.
    pub data: Value,
    /// HTTP status the database reported for the query.
    pub http_status: u16,
    pub summary: Option<String>,
}

/// A per-request database handle.
#[async_trait]
pub trait Session: Send {
    async fn query(&mut self, spec: &QuerySpec) -> Result<QuerySuccess>;

    /// Release the session. Further queries are not expected.
    fn close(&mut self);
}

/// Factory for per-request sessions.
pub trait Connector: Send + Sync {
    fn connect(&self, secret: &str, options: FetchOptions) -> Box<dyn Session>;
}

/// Scoped ownership of a [`Session`]; closes it on drop.
pub struct SessionGuard {
    session: Box<dyn Session>,
}

impl SessionGuard {
    pub fn open(connector: &dyn Connector, secret: &str, options: FetchOptions) -> Self {
        Self {
            session: connector.connect(secret, options),
        }
    }

    pub async fn query(&mut self, spec: &QuerySpec) -> Result<QuerySuccess> {
        self.session.query(spec).await
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// [`Connector`] for Fauna, sending every session's queries through a shared
/// platform [`Fetch`].
#[derive(Clone)]
pub struct FaunaConnector {
    query_url: String,
    backend: String,
    fetch: Arc<dyn Fetch>,
}

impl FaunaConnector {
    pub fn new(base_url: &str, backend: impl Into<String>, fetch: Arc<dyn Fetch>) -> Result<Self> {
        Ok(Self {
            query_url: resolve_query_url(base_url)?,
            backend: backend.into(),
            fetch,
        })
    }

    pub fn from_config(config: &EdgeConfig, fetch: Arc<dyn Fetch>) -> Result<Self> {
        Self::new(&config.database_url, config.backend.clone(), fetch)
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

impl std::fmt::Debug for FaunaConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaunaConnector")
            .field("query_url", &self.query_url)
            .field("backend", &self.backend)
            .finish()
    }
}

impl Connector for FaunaConnector {
    fn connect(&self, secret: &str, options: FetchOptions) -> Box<dyn Session> {
        let transport = FetchTransport::with_query_url(
            self.query_url.clone(),
            self.backend.clone(),
            options,
            Arc::clone(&self.fetch),
        );
        Box::new(FaunaSession::new(secret, Box::new(transport)))
    }
}

/// Session speaking the Fauna query wire protocol.
pub struct FaunaSession {
    secret: String,
    transport: Box<dyn Transport>,
    closed: bool,
}

impl FaunaSession {
    pub fn new(secret: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            secret: secret.into(),
            transport,
            closed: false,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.secret))
            .map_err(|_| Error::InvalidCredential)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("x-format", HeaderValue::from_static(RESPONSE_FORMAT));
        Ok(headers)
    }
}

#[async_trait]
impl Session for FaunaSession {
    async fn query(&mut self, spec: &QuerySpec) -> Result<QuerySuccess> {
        debug!(operation = %spec.operation(), "executing query");
        let request = TransportRequest {
            data: spec.to_wire(),
            headers: self.headers()?,
            method: Method::POST,
        };
        let response = self.transport.send(request).await?;
        decode_response(response)
    }

    fn close(&mut self) {
        if !self.closed {
            self.transport.close();
            self.closed = true;
            debug!("database session closed");
        }
    }
}

/// Decode a query endpoint response into a success value or a query error.
pub fn decode_response(response: TransportResponse) -> Result<QuerySuccess> {
    let status = response.status;
    let body: Value = serde_json::from_str(&response.body).map_err(|e| Error::Protocol {
        status,
        message: format!("response body is not JSON: {e}"),
    })?;

    if let Some(error) = body.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let summary = body
            .get("summary")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| error.get("message").and_then(Value::as_str))
            .unwrap_or(code.as_str())
            .to_string();
        return Err(Error::Query {
            status: if status >= 400 { status } else { 500 },
            code,
            summary,
        });
    }

    if !(200..300).contains(&status) {
        return Err(Error::Protocol {
            status,
            message: "error status without an error description".to_string(),
        });
    }

    let summary = body
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    match body {
        Value::Object(mut fields) => match fields.remove("data") {
            Some(data) => Ok(QuerySuccess {
                data,
                http_status: status,
                summary,
            }),
            None => Err(Error::Protocol {
                status,
                message: "response is missing 'data'".to_string(),
            }),
        },
        _ => Err(Error::Protocol {
            status,
            message: "response is not a JSON object".to_string(),
        }),
    }
}
