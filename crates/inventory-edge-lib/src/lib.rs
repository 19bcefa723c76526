//! Inventory edge library entry points.
//!
//! This crate routes REST-style inventory calls to parameterized Fauna
//! queries and maps the results back to HTTP responses. Hosts (the axum
//! service, the Lambda function) only translate their native request and
//! response types and call [`handle_request`]:
//!
//! ```text
//! request ─► RouteTable ─► SecretStore ─► SessionGuard ─► QuerySpec
//!                                              │
//!                      HttpResponse ◄─ mapper ◄┘ (FetchTransport ─► Fetch)
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides an in-memory database and fake fetch
//! implementations. Enable the `test-utils` feature to access it from
//! dependent crates.

#![deny(warnings)]

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod mapper;
mod problem;
pub mod query;
mod response;
pub mod routing;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{decode_response, Connector, FaunaConnector, FaunaSession, QuerySuccess, Session, SessionGuard};
pub use config::{EdgeConfig, EnvSecretStore, MemorySecretStore, SecretStore};
pub use error::{Error, Result};
pub use fetch::{CacheOverride, Fetch, FetchError, FetchOptions, FetchRequest, FetchResponse, ReqwestFetch};
pub use handler::{build_query, handle_request, EdgeContext, IncomingRequest};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_BAD_GATEWAY, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_REQUEST, PROBLEM_NETWORK_ERROR,
};
pub use query::{encode_argument, ItemPayload, Operation, QuerySpec};
pub use response::{HttpResponse, CONTENT_TYPE_JSON, CONTENT_TYPE_PROBLEM, CONTENT_TYPE_TEXT};
pub use routing::{PathPattern, Route, RouteMatch, RouteTable};
pub use transport::{FetchTransport, Transport, TransportRequest, TransportResponse, QUERY_PATH};
