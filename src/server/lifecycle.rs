use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ServerTimeouts;
use crate::error::ServerError;

use super::listener::accept_loop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// What ended the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// An OS signal, by name (`interrupt`, `terminate`).
    Signal(&'static str),
    /// [`ShutdownHandle::shutdown`] was called.
    Requested,
}

/// Requests shutdown of a running controller from anywhere.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    trigger: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.trigger.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.trigger.borrow()
    }
}

/// Exists only between a successful bind and the end of shutdown.
struct RunningServer {
    local_addr: SocketAddr,
    accept_task: JoinHandle<JoinSet<()>>,
    shutdown_deadline: Duration,
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("local_addr", &self.local_addr)
            .field("shutdown_deadline", &self.shutdown_deadline)
            .finish_non_exhaustive()
    }
}

/// Owns the listener and drives it through
/// `Idle → Starting → Running → ShuttingDown → Stopped`.
///
/// Shutdown is triggered either by the future passed to
/// [`wait_for_shutdown`](Self::wait_for_shutdown) (normally an OS signal) or
/// through a [`ShutdownHandle`]. In-flight requests get the configured
/// shutdown timeout to finish; connections still open after that are aborted.
#[derive(Debug)]
pub struct LifecycleController {
    timeouts: ServerTimeouts,
    state: watch::Sender<ServerState>,
    trigger: Arc<watch::Sender<bool>>,
    running: Option<RunningServer>,
}

impl LifecycleController {
    pub fn new(timeouts: ServerTimeouts) -> Self {
        let (state, _) = watch::channel(ServerState::Idle);
        let (trigger, _) = watch::channel(false);
        Self {
            timeouts,
            state,
            trigger: Arc::new(trigger),
            running: None,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            trigger: Arc::clone(&self.trigger),
        }
    }

    /// Address actually bound, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    fn transition(&self, next: ServerState) {
        let previous = self.state.send_replace(next);
        debug!(from = ?previous, to = ?next, "server state changed");
    }

    /// Bind `addr` and start serving `app` in the background.
    pub async fn start(&mut self, addr: &str, app: Router) -> Result<SocketAddr, ServerError> {
        if self.state() != ServerState::Idle {
            return Err(ServerError::AlreadyStarted);
        }
        self.transition(ServerState::Starting);

        let bound = TcpListener::bind(addr)
            .await
            .and_then(|listener| listener.local_addr().map(|local| (listener, local)));
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.transition(ServerState::Stopped);
                return Err(ServerError::BindFailed {
                    addr: addr.to_string(),
                    source,
                });
            }
        };

        let accept_task = tokio::spawn(accept_loop(
            listener,
            app,
            self.timeouts,
            self.trigger.subscribe(),
        ));
        self.running = Some(RunningServer {
            local_addr,
            accept_task,
            shutdown_deadline: self.timeouts.shutdown,
        });
        self.transition(ServerState::Running);
        info!(%local_addr, "mock server listening");
        Ok(local_addr)
    }

    /// Block until `signal` resolves or a [`ShutdownHandle`] fires.
    pub async fn wait_for_shutdown<F>(&self, signal: F) -> ShutdownCause
    where
        F: Future<Output = ShutdownCause>,
    {
        let mut requested = self.trigger.subscribe();
        tokio::select! {
            cause = signal => cause,
            _ = requested.wait_for(|stop| *stop) => ShutdownCause::Requested,
        }
    }

    /// Stop accepting, let open connections finish, then reach `Stopped`.
    ///
    /// If connections are still open when the shutdown timeout expires they
    /// are aborted and [`ServerError::ShutdownTimeout`] is returned; the
    /// controller is `Stopped` either way. Calling this again is a no-op.
    pub async fn shutdown(&mut self) -> Result<(), ServerError> {
        let Some(running) = self.running.take() else {
            if self.state() != ServerState::Stopped {
                self.transition(ServerState::Stopped);
            }
            return Ok(());
        };

        self.transition(ServerState::ShuttingDown);
        let deadline = Instant::now() + running.shutdown_deadline;
        self.trigger.send_replace(true);

        let mut connections = match running.accept_task.await {
            Ok(connections) => connections,
            Err(e) => {
                warn!("listener task ended abnormally: {e}");
                JoinSet::new()
            }
        };

        let drained = tokio::time::timeout_at(deadline, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        let result = match drained {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(
                    open = connections.len(),
                    "graceful shutdown timed out, closing remaining connections"
                );
                connections.shutdown().await;
                Err(ServerError::ShutdownTimeout(running.shutdown_deadline))
            }
        };

        self.transition(ServerState::Stopped);
        result
    }
}
