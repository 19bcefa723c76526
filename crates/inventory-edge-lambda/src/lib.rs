//! AWS Lambda host for the inventory edge router.
//!
//! Receives API Gateway proxy events, hands them to
//! [`inventory_edge_lib::handle_request`] and returns proxy responses.

#![deny(warnings)]

mod runtime;
mod tracing_init;

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use inventory_edge_lib::{handle_request, EdgeContext, HttpResponse, IncomingRequest, ProblemDetails};

pub use runtime::{init_runtime, InitError};
pub use tracing_init::init_tracing;

/// API Gateway REST proxy event; fields the router does not use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    pub http_method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// API Gateway proxy response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl From<HttpResponse> for ProxyResponse {
    fn from(response: HttpResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            status_code: response.status,
            headers,
            body: response.body,
            is_base64_encoded: false,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Entry point used by the Lambda binary.
pub async fn run() -> Result<(), Error> {
    init_tracing()?;
    if let Err(e) = init_runtime() {
        error!(error = %e, "starting with a failed runtime; requests will return 500");
    }
    lambda_runtime::run(service_fn(handler)).await
}

/// Lambda handler invoked per request.
pub async fn handler(event: LambdaEvent<Value>) -> Result<ProxyResponse, Error> {
    let request_id = event.context.request_id.clone();

    let proxy: ProxyEvent = match serde_json::from_value(event.payload) {
        Ok(proxy) => proxy,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "failed to parse proxy event");
            return Ok(ProblemDetails::bad_request(
                format!("Invalid proxy event: {e}"),
                &request_id,
            )
            .into_response()
            .into());
        }
    };

    let ctx = match init_runtime() {
        Ok(ctx) => ctx,
        Err(e) => {
            return Ok(ProblemDetails::internal_error(e.to_string(), &request_id)
                .into_response()
                .into())
        }
    };

    Ok(handle_proxy_event(ctx, proxy, &request_id).await)
}

/// Translate a proxy event, run it through the edge handler and translate
/// the response back.
pub async fn handle_proxy_event(
    ctx: &EdgeContext,
    event: ProxyEvent,
    request_id: &str,
) -> ProxyResponse {
    let request = match to_incoming(event, request_id) {
        Ok(request) => request,
        Err(problem) => return problem.into_response().into(),
    };

    info!(
        request_id = %request_id,
        method = %request.method,
        path = %request.path,
        "handling proxy event"
    );

    let mut response: ProxyResponse = handle_request(ctx, request).await.into();
    response
        .headers
        .insert("x-request-id".to_string(), request_id.to_string());
    response
}

fn to_incoming(event: ProxyEvent, request_id: &str) -> Result<IncomingRequest, ProblemDetails> {
    let method = Method::from_bytes(event.http_method.to_uppercase().as_bytes()).map_err(|_| {
        ProblemDetails::bad_request(
            format!("invalid HTTP method '{}'", event.http_method),
            request_id,
        )
    })?;

    let body = match event.body {
        None => Vec::new(),
        Some(body) if event.is_base64_encoded => STANDARD.decode(body.as_bytes()).map_err(|e| {
            ProblemDetails::bad_request(format!("body is not valid base64: {e}"), request_id)
        })?,
        Some(body) => body.into_bytes(),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &event.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    Ok(IncomingRequest {
        method,
        path: event.path,
        headers,
        body,
        request_id: request_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proxy_event_parses_api_gateway_shape() {
        let event: ProxyEvent = serde_json::from_value(json!({
            "resource": "/{proxy+}",
            "httpMethod": "PUT",
            "path": "/inventory/7",
            "headers": null,
            "queryStringParameters": {"a": "b"},
            "body": "{\"item\":\"pen\"}",
            "isBase64Encoded": false
        }))
        .unwrap();
        assert_eq!(event.http_method, "PUT");
        assert_eq!(event.path, "/inventory/7");
        assert!(event.headers.is_empty());
        assert_eq!(event.body.as_deref(), Some("{\"item\":\"pen\"}"));
    }

    #[test]
    fn base64_bodies_are_decoded() {
        let event = ProxyEvent {
            http_method: "post".to_string(),
            path: "/inventory".to_string(),
            body: Some(STANDARD.encode(br#"{"item":"pen"}"#)),
            is_base64_encoded: true,
            ..ProxyEvent::default()
        };
        let request = to_incoming(event, "req-1").unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, br#"{"item":"pen"}"#.to_vec());
    }

    #[test]
    fn invalid_base64_is_400() {
        let event = ProxyEvent {
            http_method: "POST".to_string(),
            path: "/inventory".to_string(),
            body: Some("***".to_string()),
            is_base64_encoded: true,
            ..ProxyEvent::default()
        };
        let problem = to_incoming(event, "req-2").unwrap_err();
        assert_eq!(problem.status, 400);
    }

    #[test]
    fn invalid_method_is_400() {
        let event = ProxyEvent {
            http_method: "GE T".to_string(),
            path: "/".to_string(),
            ..ProxyEvent::default()
        };
        assert_eq!(to_incoming(event, "req-3").unwrap_err().status, 400);
    }

    #[test]
    fn response_headers_are_flattened() {
        let response: ProxyResponse = HttpResponse::text(404, "id not found").into();
        assert_eq!(response.status_code, 404);
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("text/plain; charset=utf-8")
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], json!(404));
        assert_eq!(json["isBase64Encoded"], json!(false));
    }
}
