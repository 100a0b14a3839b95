use std::sync::Arc;

use sendguard::bridge::serve_lines;
use sendguard::{build_state_from_env, register_handlers};
use tokio::io::{stdin, stdout, BufReader};
use tokio::signal;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise structured logging. Reads RUST_LOG environment variable.
    // Logs go to stderr; stdout carries bridge responses.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = build_state_from_env()?;
    let dispatcher = Arc::new(register_handlers(&state)?);
    tracing::info!(handlers = ?dispatcher.ids(), "serving host events on stdio");

    tokio::select! {
        res = serve_lines(dispatcher, BufReader::new(stdin()), stdout()) => {
            res?;
            tracing::info!("input closed");
        }
        _ = signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}
