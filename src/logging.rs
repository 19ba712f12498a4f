//! Diagnostic logging to stderr. Record output never goes through here.
//!
//! Priority: `RUST_LOG` > `-v` count > default `warn`. Tokens and passwords are
//! never logged at any level.

use tracing_subscriber::EnvFilter;

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .compact()
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "logging initialised");
}
