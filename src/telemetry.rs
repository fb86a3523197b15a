use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr so stdout stays CSV only.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
