//! OS signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) trigger graceful shutdown. There
//! is no reload signal: configuration is fixed for the life of the process.

use std::io;

/// Wait for the first termination signal.
#[cfg(unix)]
pub async fn termination() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    };
    tracing::info!(signal = name, "Termination signal received");
    Ok(name)
}

/// Wait for the first termination signal.
#[cfg(not(unix))]
pub async fn termination() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl_c", "Termination signal received");
    Ok("ctrl_c")
}
