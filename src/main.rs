//! supalog entry point: parses CLI and starts the async application runtime.
//! The main function is intentionally thin and delegates to the runtime in `app`.

mod app;
mod auth;
mod cli;
mod error;
mod export;
mod fetch;
mod filter;
mod log;
mod logging;
mod rest;
mod state;
mod stats;
mod tail;
mod ui;

#[cfg(test)]
mod testing;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal; flags and the environment still apply.
    let _ = dotenvy::dotenv();
    let config = cli::parse();
    logging::init(config.verbosity);

    match app::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "run failed");
            eprintln!("\n❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}
