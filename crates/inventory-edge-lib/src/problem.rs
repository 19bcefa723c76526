//! RFC 9457 Problem Details for errors without a database-provided status.
//!
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::response::HttpResponse;

/// Problem type URI for malformed request bodies or path parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for upstream connection failures.
pub const PROBLEM_NETWORK_ERROR: &str = "/problems/network-error";

/// Problem type URI for unreadable database responses.
pub const PROBLEM_BAD_GATEWAY: &str = "/problems/bad-gateway";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use inventory_edge_lib::ProblemDetails;
///
/// let problem = ProblemDetails::bad_request("expected value at line 1", "req-12345");
/// assert_eq!(problem.status, 400);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// The request identifier of this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the request identifier. Empty identifiers are omitted.
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        if !request_id.is_empty() {
            self.instance = Some(request_id.to_string());
        }
        self
    }

    /// 400 Bad Request for invalid caller input.
    pub fn bad_request(detail: impl Into<String>, request_id: &str) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 500 for a failed upstream connection.
    pub fn network_error(detail: impl Into<String>, request_id: &str) -> Self {
        Self::new(
            PROBLEM_NETWORK_ERROR,
            "Network Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 502 for a database response that could not be understood.
    pub fn bad_gateway(detail: impl Into<String>, request_id: &str) -> Self {
        Self::new(PROBLEM_BAD_GATEWAY, "Bad Gateway", StatusCode::BAD_GATEWAY)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    /// 500 Internal Server Error.
    pub fn internal_error(detail: impl Into<String>, request_id: &str) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Render as an `application/problem+json` response.
    pub fn into_response(self) -> HttpResponse {
        let status = self.status;
        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            format!(r#"{{"title":"{}","status":{status}}}"#, self.title)
        });
        HttpResponse::problem(status, body)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.title,
            self.detail.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ProblemDetails {}

/// Convert a library error to ProblemDetails.
///
/// Database query errors carry their own status and are rendered by the
/// response mapper instead; passed here they become a 500.
pub fn from_lib_error(error: &Error, request_id: &str) -> ProblemDetails {
    match error {
        Error::InvalidBody { .. } | Error::InvalidPathParameter { .. } => {
            ProblemDetails::bad_request(error.to_string(), request_id)
        }
        Error::Network { .. } => ProblemDetails::network_error(error.to_string(), request_id),
        Error::Protocol { .. } => ProblemDetails::bad_gateway(error.to_string(), request_id),
        _ => ProblemDetails::internal_error(error.to_string(), request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::CONTENT_TYPE_PROBLEM;

    #[test]
    fn serialization_uses_rfc_field_names() {
        let problem = ProblemDetails::bad_request("Test error", "req-test");
        let json = serde_json::to_string(&problem).unwrap();

        assert!(json.contains("\"type\":\"/problems/invalid-request\""));
        assert!(json.contains("\"title\":\"Invalid Request\""));
        assert!(json.contains("\"status\":400"));
        assert!(json.contains("\"detail\":\"Test error\""));
        assert!(json.contains("\"instance\":\"req-test\""));
    }

    #[test]
    fn empty_request_id_is_omitted() {
        let problem = ProblemDetails::internal_error("boom", "");
        assert!(problem.instance.is_none());
        let json = serde_json::to_string(&problem).unwrap();
        assert!(!json.contains("instance"));
    }

    #[test]
    fn into_response_sets_problem_content_type() {
        let response = ProblemDetails::bad_request("bad", "req-1").into_response();
        assert_eq!(response.status, 400);
        assert_eq!(response.content_type(), Some(CONTENT_TYPE_PROBLEM));
        let body: ProblemDetails = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body.detail.as_deref(), Some("bad"));
    }

    #[test]
    fn lib_errors_map_to_statuses() {
        let cases = [
            (
                Error::InvalidBody {
                    message: "eof".into(),
                },
                400,
            ),
            (
                Error::InvalidPathParameter {
                    value: "%FF".into(),
                },
                400,
            ),
            (
                Error::network(std::io::Error::other("refused")),
                500,
            ),
            (
                Error::Protocol {
                    status: 200,
                    message: "not json".into(),
                },
                502,
            ),
            (
                Error::MissingCredential {
                    key: "FAUNA_ACCESS_KEY".into(),
                },
                500,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(from_lib_error(&error, "req").status, status, "{error}");
        }
    }

    #[test]
    fn network_detail_is_the_fixed_message() {
        let problem = from_lib_error(&Error::network(std::io::Error::other("x")), "req");
        assert_eq!(
            problem.detail.as_deref(),
            Some("The network connection encountered a problem.")
        );
    }
}
