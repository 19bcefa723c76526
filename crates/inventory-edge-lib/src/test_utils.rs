//! In-memory fakes for the fetch primitive and the database client.
//!
//! Enabled for unit tests and, for other crates, through the `test-utils`
//! feature.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use http::HeaderMap;
use serde_json::{json, Map, Value};

use crate::client::{Connector, QuerySuccess, Session};
use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchError, FetchOptions, FetchRequest, FetchResponse};
use crate::query::{Operation, QuerySpec};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`Fetch`] that records every request and answers with a canned response.
#[derive(Debug)]
pub struct RecordingFetch {
    status: u16,
    body: String,
    requests: Mutex<Vec<FetchRequest>>,
}

impl RecordingFetch {
    pub fn ok(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<FetchRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl Fetch for RecordingFetch {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        lock(&self.requests).push(request);
        Ok(FetchResponse {
            status: self.status,
            headers: HeaderMap::new(),
            body: self.body.clone(),
        })
    }
}

/// [`Fetch`] whose every request fails before a response is obtained.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingFetch;

#[async_trait]
impl Fetch for FailingFetch {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        Err(FetchError::UnknownBackend {
            name: request.backend,
        })
    }
}

#[derive(Debug, Clone)]
enum Failure {
    Query {
        status: u16,
        code: String,
        summary: String,
    },
    Network,
}

#[derive(Debug, Default)]
struct DatabaseState {
    documents: Mutex<BTreeMap<String, Value>>,
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    options: Mutex<Vec<FetchOptions>>,
    executed: Mutex<Vec<QuerySpec>>,
    failure: Mutex<Option<Failure>>,
}

/// [`Connector`] over an in-memory `Inventory` collection.
///
/// Executes each [`QuerySpec`] with the semantics of its template and counts
/// opened and closed sessions. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<DatabaseState>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly and return its id.
    pub fn insert(&self, item: Value, quantity: Value, price: Value) -> String {
        let id = self.allocate_id();
        let document = json!({"id": id, "item": item, "quantity": quantity, "price": price});
        lock(&self.state.documents).insert(id.clone(), document);
        id
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        lock(&self.state.documents).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Fetch options of every session opened so far, in order.
    pub fn session_options(&self) -> Vec<FetchOptions> {
        lock(&self.state.options).clone()
    }

    /// Queries executed so far, in order.
    pub fn executed(&self) -> Vec<QuerySpec> {
        lock(&self.state.executed).clone()
    }

    /// Make every following query fail as rejected by the database.
    pub fn fail_with_query_error(&self, status: u16, code: &str, summary: &str) {
        *lock(&self.state.failure) = Some(Failure::Query {
            status,
            code: code.to_string(),
            summary: summary.to_string(),
        });
    }

    /// Make every following query fail with a connection error.
    pub fn fail_with_network_error(&self) {
        *lock(&self.state.failure) = Some(Failure::Network);
    }

    fn allocate_id(&self) -> String {
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        (400_000_000_000_000_000u64 + n).to_string()
    }

    fn execute(&self, spec: &QuerySpec) -> Result<QuerySuccess> {
        lock(&self.state.executed).push(spec.clone());

        if let Some(failure) = lock(&self.state.failure).clone() {
            return Err(match failure {
                Failure::Query {
                    status,
                    code,
                    summary,
                } => Error::Query {
                    status,
                    code,
                    summary,
                },
                Failure::Network => Error::network(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            });
        }

        let id = spec.param("id").and_then(Value::as_str).map(String::from);
        let field = |name: &str| spec.param(name).cloned().unwrap_or(Value::Null);

        let data = match spec.operation() {
            Operation::Health => json!("Hello World"),
            Operation::List => {
                let documents: Vec<Value> =
                    lock(&self.state.documents).values().cloned().collect();
                json!({"data": documents, "after": null})
            }
            Operation::GetById => id.and_then(|id| self.get(&id)).unwrap_or(Value::Null),
            Operation::Create => {
                let id = self.insert(field("item"), field("quantity"), field("price"));
                self.get(&id).unwrap_or(Value::Null)
            }
            Operation::Update => {
                let mut documents = lock(&self.state.documents);
                let document = match id.as_deref() {
                    Some(id) => documents.get_mut(id),
                    None => None,
                };
                match document {
                    Some(Value::Object(document)) => {
                        merge(document, "item", field("item"));
                        merge(document, "quantity", field("quantity"));
                        merge(document, "price", field("price"));
                        Value::Object(document.clone())
                    }
                    _ => Value::Null,
                }
            }
            Operation::Delete => match id {
                Some(id) => match lock(&self.state.documents).remove(&id) {
                    Some(_) => Value::String(id),
                    None => Value::Null,
                },
                None => Value::Null,
            },
        };

        Ok(QuerySuccess {
            data,
            http_status: 200,
            summary: None,
        })
    }
}

/// Update semantics: a `null` field removes it.
fn merge(document: &mut Map<String, Value>, name: &str, value: Value) {
    if value.is_null() {
        document.remove(name);
    } else {
        document.insert(name.to_string(), value);
    }
}

impl Connector for InMemoryDatabase {
    fn connect(&self, _secret: &str, options: FetchOptions) -> Box<dyn Session> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.options).push(options);
        Box::new(InMemorySession {
            database: self.clone(),
            closed: false,
        })
    }
}

struct InMemorySession {
    database: InMemoryDatabase,
    closed: bool,
}

#[async_trait]
impl Session for InMemorySession {
    async fn query(&mut self, spec: &QuerySpec) -> Result<QuerySuccess> {
        self.database.execute(spec)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.database.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
