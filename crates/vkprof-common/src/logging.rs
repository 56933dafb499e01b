use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging with environment filter.
/// Set VKPROF_LOG=debug (or trace, info, warn, error) for verbosity control.
///
/// The layer lives inside someone else's process, so an already installed
/// global subscriber is left in place.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("VKPROF_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}
