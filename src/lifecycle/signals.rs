//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT (Ctrl+C) and SIGTERM
//! - Translate the first one received into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged and never fires; the
//!   other signal still works

use std::future::pending;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{ShutdownCause, ShutdownCoordinator};

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler");
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    pending::<()>().await;
}

/// Wait for the first shutdown signal and report which one it was.
pub async fn shutdown_signal() -> ShutdownCause {
    tokio::select! {
        () = interrupt() => ShutdownCause::Interrupt,
        () = terminate() => ShutdownCause::Terminate,
    }
}

/// Trigger `coordinator` when a shutdown signal arrives.
///
/// The task exits early if shutdown is triggered some other way.
pub fn spawn_signal_listener(coordinator: ShutdownCoordinator) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            cause = shutdown_signal() => {
                tracing::info!(%cause, "Shutdown signal received");
                coordinator.trigger(cause);
            }
            () = coordinator.draining() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn listener_exits_when_shutdown_starts_elsewhere() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let listener = spawn_signal_listener(coordinator.clone());

        coordinator.trigger(ShutdownCause::Requested);
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.cause(), Some(ShutdownCause::Requested));
    }
}
