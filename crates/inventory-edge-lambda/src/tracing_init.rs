//! Tracing initialization for the Lambda function.
//!
//! Events are written as flattened JSON lines for CloudWatch Logs. The level
//! filter comes from `RUST_LOG` and defaults to `info`.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the JSON subscriber. Call once, before `lambda_runtime::run`.
///
/// ```no_run
/// #[tokio::main]
/// async fn main() -> Result<(), lambda_runtime::Error> {
///     inventory_edge_lambda::init_tracing()?;
///     Ok(())
/// }
/// ```
pub fn init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .without_time()
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}
