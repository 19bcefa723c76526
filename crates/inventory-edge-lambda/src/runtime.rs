//! Lazily-initialized edge context reused across invocations.

use std::sync::{Arc, OnceLock};

use inventory_edge_lib::{EdgeConfig, EdgeContext, EnvSecretStore};
use tracing::{error, info};

static RUNTIME: OnceLock<Result<EdgeContext, InitError>> = OnceLock::new();

/// Cold-start failure, kept so every invocation can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitError {
    pub message: String,
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lambda initialization failed: {}", self.message)
    }
}

impl std::error::Error for InitError {}

impl From<inventory_edge_lib::Error> for InitError {
    fn from(err: inventory_edge_lib::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Build the edge context from the environment on first use.
pub fn init_runtime() -> Result<&'static EdgeContext, &'static InitError> {
    RUNTIME
        .get_or_init(|| {
            let config = EdgeConfig::from_env();
            info!(
                database_url = %config.database_url,
                backend = %config.backend,
                "initializing Lambda runtime"
            );
            EdgeContext::fauna(config, reqwest::Client::new(), Arc::new(EnvSecretStore))
                .map_err(|e| {
                    error!(error = %e, "Lambda runtime initialization failed");
                    InitError::from(e)
                })
        })
        .as_ref()
}
