// Logging setup shared by the daemon and the client
// Everything goes to stderr; stdout is reserved for client output

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `SAND_LOG=sand_lib=debug`
pub const LOG_ENV: &str = "SAND_LOG";

/// Install the global subscriber.
///
/// The filter comes from `SAND_LOG`, then `RUST_LOG`, then `default_directive`.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A subscriber may already be installed (tests); keep the existing one
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
