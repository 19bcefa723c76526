//! Declarative route table.
//!
//! Routes are scanned in declaration order and the first route whose method
//! and path pattern both match wins, so `/inventory` and `/inventory/{id}`
//! are disambiguated by ordering rather than by pattern priority.

use std::borrow::Cow;
use std::fmt;

use http::Method;

use crate::error::{Error, Result};
use crate::query::Operation;

/// Path template matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches the path exactly; paths other than `/` also match with one
    /// trailing slash.
    Exact(&'static str),
    /// Matches `<prefix>/{param}` with an optional trailing slash. The
    /// parameter is a single non-empty segment.
    Param(&'static str),
}

impl PathPattern {
    /// Match `path`, returning the raw positional parameter if any.
    ///
    /// `None` means no match; `Some(None)` is a match without a parameter.
    pub fn matches<'a>(&self, path: &'a str) -> Option<Option<&'a str>> {
        match *self {
            PathPattern::Exact(template) => {
                let exact = path == template
                    || (template != "/" && path.strip_suffix('/') == Some(template));
                exact.then_some(None)
            }
            PathPattern::Param(prefix) => {
                let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
                let segment = rest.strip_suffix('/').unwrap_or(rest);
                (!segment.is_empty() && !segment.contains('/')).then_some(Some(segment))
            }
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(template) => f.write_str(template),
            PathPattern::Param(prefix) => write!(f, "{prefix}/{{id}}"),
        }
    }
}

/// A (method, path pattern) binding to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub operation: Operation,
}

impl Route {
    pub fn new(method: Method, pattern: PathPattern, operation: Operation) -> Self {
        Self {
            method,
            pattern,
            operation,
        }
    }
}

/// Result of a successful route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub operation: Operation,
    raw_param: Option<String>,
}

impl RouteMatch {
    /// The positional parameter exactly as it appeared in the path.
    pub fn raw_param(&self) -> Option<&str> {
        self.raw_param.as_deref()
    }

    /// The percent-decoded item id.
    ///
    /// Fails with [`Error::InvalidPathParameter`] when the route has no
    /// parameter or the parameter does not decode to UTF-8.
    pub fn id(&self) -> Result<String> {
        let raw = self.raw_param.as_deref().unwrap_or_default();
        if raw.is_empty() {
            return Err(Error::InvalidPathParameter {
                value: raw.to_string(),
            });
        }
        urlencoding::decode(raw)
            .map(Cow::into_owned)
            .map_err(|_| Error::InvalidPathParameter {
                value: raw.to_string(),
            })
    }
}

/// Ordered, immutable route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The inventory API table.
    pub fn inventory() -> Self {
        Self::new(vec![
            Route::new(Method::GET, PathPattern::Exact("/"), Operation::Health),
            Route::new(Method::GET, PathPattern::Exact("/inventory"), Operation::List),
            Route::new(Method::GET, PathPattern::Param("/inventory"), Operation::GetById),
            Route::new(Method::POST, PathPattern::Exact("/inventory"), Operation::Create),
            Route::new(Method::PUT, PathPattern::Param("/inventory"), Operation::Update),
            Route::new(Method::DELETE, PathPattern::Param("/inventory"), Operation::Delete),
        ])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the first route matching `method` and `path`. Any query string
    /// on `path` is ignored.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let path = path.split('?').next().unwrap_or(path);
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.pattern.matches(path).map(|param| RouteMatch {
                    operation: route.operation,
                    raw_param: param.map(String::from),
                })
            })
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::inventory()
    }
}
