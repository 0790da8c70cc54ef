use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber: plain text on stderr, filtered by
/// `RUST_LOG` when set and by `default_level` otherwise.
///
/// Stdout stays reserved for the balance report.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}
