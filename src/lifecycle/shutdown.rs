//! Shutdown coordination for the API server.
//!
//! # States
//! ```text
//! Running ──trigger()──▶ Draining ──drained or deadline──▶ Stopped
//! ```
//!
//! # Design Decisions
//! - Only the first trigger counts; later ones are logged and ignored
//! - Draining stops the accept loop immediately; requests already
//!   executing get until the drain deadline to finish
//! - A missed deadline is an error, so the process can exit non-zero

use std::fmt;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::net::InFlightTracker;

/// Lifecycle state of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Running,
    Draining,
    Stopped,
}

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Requested from inside the process.
    Requested,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownCause::Interrupt => "interrupt",
            ShutdownCause::Terminate => "terminate",
            ShutdownCause::Requested => "requested",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("drain deadline of {timeout:?} passed with {in_flight} request(s) still in flight")]
    DrainTimeout { timeout: Duration, in_flight: usize },
}

struct Inner {
    state: watch::Sender<ServerState>,
    cause: OnceLock<ShutdownCause>,
    drain_timeout: Duration,
    in_flight: InFlightTracker,
}

/// Coordinator for graceful shutdown.
///
/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        let (state, _rx) = watch::channel(ServerState::Running);
        Self {
            inner: Arc::new(Inner {
                state,
                cause: OnceLock::new(),
                drain_timeout,
                in_flight: InFlightTracker::new(),
            }),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Cause of the shutdown, once one has been triggered.
    pub fn cause(&self) -> Option<ShutdownCause> {
        self.inner.cause.get().copied()
    }

    /// Upper bound on the wait for in-flight requests once draining.
    pub fn drain_timeout(&self) -> Duration {
        self.inner.drain_timeout
    }

    /// Tracker shared with the in-flight middleware.
    pub fn in_flight(&self) -> &InFlightTracker {
        &self.inner.in_flight
    }

    /// Begin draining. Returns `false` if shutdown was already underway.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        let started = self.inner.state.send_if_modified(|state| {
            if *state != ServerState::Running {
                return false;
            }
            *state = ServerState::Draining;
            let _ = self.inner.cause.set(cause);
            true
        });

        if started {
            tracing::info!(
                %cause,
                in_flight = self.inner.in_flight.in_flight(),
                "Shutdown triggered, draining"
            );
        } else {
            tracing::debug!(%cause, state = ?self.state(), "Shutdown already in progress");
        }
        started
    }

    /// Resolves once the server leaves `Running`.
    pub fn draining(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.state.subscribe();
        async move {
            loop {
                if *rx.borrow_and_update() != ServerState::Running {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }

    /// Serve `app` on `listener` until shutdown is triggered and the drain
    /// completes or its deadline passes.
    pub async fn serve(&self, listener: TcpListener, app: Router) -> Result<(), ShutdownError> {
        let app = app.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(self.draining())
            .into_future();
        tokio::pin!(server);

        let result = tokio::select! {
            served = &mut server => served.map_err(ShutdownError::Serve),
            () = self.draining() => {
                let timeout = self.drain_timeout();
                tracing::info!(
                    ?timeout,
                    in_flight = self.inner.in_flight.in_flight(),
                    "Listener closed, waiting for in-flight requests"
                );
                // Connections closing is not enough: every tracked request
                // must have released its guard before the server is stopped.
                let drained = async {
                    let served = (&mut server).await;
                    self.inner.in_flight.wait_idle().await;
                    served
                };
                match tokio::time::timeout(timeout, drained).await {
                    Ok(served) => served.map_err(ShutdownError::Serve),
                    Err(_) => Err(ShutdownError::DrainTimeout {
                        timeout,
                        in_flight: self.inner.in_flight.in_flight(),
                    }),
                }
            }
        };

        self.inner.state.send_replace(ServerState::Stopped);
        match &result {
            Ok(()) => tracing::info!("Server stopped"),
            Err(err) => tracing::error!(error = %err, "Server stopped uncleanly"),
        }
        result
    }
}
