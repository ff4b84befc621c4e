//! OS signal handling.
//!
//! SIGINT and SIGTERM both mean "stop accepting and exit". Running
//! sessions are not signalled here; their processes are torn down as each
//! WebSocket closes.

use tokio::signal::unix::{signal, SignalKind};

/// Wait for SIGINT or SIGTERM and return its name.
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
