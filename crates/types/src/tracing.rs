use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Request spans from the gateway's `TraceLayer` are emitted at debug level.
const DEFAULT_FILTER: &str = "info,tower_http=debug";

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs a stderr subscriber filtered by `RUST_LOG`, or by
/// [`DEFAULT_FILTER`] when that is unset or invalid. stdout stays free for
/// CLI output.
///
/// Returns `false` when another subscriber was already installed.
pub fn init_tracing() -> bool {
    *INSTALLED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .try_init()
            .is_ok()
    })
}
