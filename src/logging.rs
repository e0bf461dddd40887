//! Centralized logging setup with dual output (stderr + governor.log)
//!
//! Stdout is reserved for the control protocol, so terminal output goes to
//! stderr.

use crate::constants::logging::FILE_PREFIX;
use std::path::Path;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Initialize logging to stderr, plus `governor.log` in `log_dir` when given
///
/// Both outputs use the level from RUST_LOG, defaulting to "info".
///
/// The _guard is forgotten to keep the file appender alive for the program lifetime.
pub fn init_logging(log_dir: Option<&Path>) {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter());

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(stderr_layer).init();
        return;
    };

    let file_appender = tracing_appender::rolling::never(dir, FILE_PREFIX);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .init();

    // Keep guard alive for the program lifetime
    std::mem::forget(_guard);
}
