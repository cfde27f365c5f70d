//! Tracing setup for the CLI

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Logs go to stderr so
/// projections on stdout stay machine-readable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.with_target(false).try_init()
    };
    if let Err(err) = installed {
        eprintln!("tracing already initialised: {err}");
    }
}
