//! Host-neutral HTTP response value.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_PROBLEM: &str = "application/problem+json";

/// Response produced by the request handler and translated by each host.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Case-insensitive; `insert` replaces any previous value.
    pub headers: HeaderMap,
}

impl HttpResponse {
    fn with_content_type(status: u16, body: String, content_type: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status,
            body,
            headers,
        }
    }

    /// Plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, body.into(), CONTENT_TYPE_TEXT)
    }

    /// JSON response, pretty-printed with two-space indentation.
    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_string_pretty(value)?;
        Ok(Self::with_content_type(status, body, CONTENT_TYPE_JSON))
    }

    /// Problem details response.
    pub(crate) fn problem(status: u16, body: String) -> Self {
        Self::with_content_type(status, body, CONTENT_TYPE_PROBLEM)
    }

    /// Set a header, replacing any existing value. Invalid values are
    /// ignored.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// Status as an `http::StatusCode`, falling back to 500 for values
    /// outside the valid range.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
