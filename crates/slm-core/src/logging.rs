//! Tracing subscriber setup.

/// Initialize the global tracing subscriber writing compact lines to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. Call once at startup;
/// later calls are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // Fails only when a global subscriber is already installed.
    let _ = subscriber.try_init();
}
