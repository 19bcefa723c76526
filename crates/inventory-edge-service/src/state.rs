//! Application state shared by the axum handlers.

use std::sync::Arc;

use inventory_edge_lib::{EdgeConfig, EdgeContext, EnvSecretStore};

/// Default limit on request body size.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Cheaply cloneable state holding the edge context.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    edge: EdgeContext,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(edge: EdgeContext) -> Self {
        Self::with_body_limit(edge, DEFAULT_MAX_BODY_BYTES)
    }

    pub fn with_body_limit(edge: EdgeContext, max_body_bytes: usize) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                edge,
                max_body_bytes,
            }),
        }
    }

    /// State for the production service: Fauna over a shared `reqwest`
    /// client, credentials from the environment.
    pub fn from_config(config: EdgeConfig) -> inventory_edge_lib::Result<Self> {
        let edge = EdgeContext::fauna(config, reqwest::Client::new(), Arc::new(EnvSecretStore))?;
        Ok(Self::new(edge))
    }

    pub fn edge(&self) -> &EdgeContext {
        &self.inner.edge
    }

    pub fn max_body_bytes(&self) -> usize {
        self.inner.max_body_bytes
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("edge", &self.inner.edge)
            .field("max_body_bytes", &self.inner.max_body_bytes)
            .finish()
    }
}
