#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::error::ServerError;

use super::lifecycle::ShutdownCause;

/// Interrupt and terminate, registered up front.
///
/// Registration happens in [`ShutdownSignal::register`], not on first poll,
/// so a signal arriving before anyone awaits [`recv`](Self::recv) is kept
/// until it is consumed.
#[derive(Debug)]
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignal {
    pub fn register() -> Result<Self, ServerError> {
        #[cfg(unix)]
        {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt()).map_err(ServerError::SignalError)?,
                terminate: signal(SignalKind::terminate()).map_err(ServerError::SignalError)?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    pub async fn recv(&mut self) -> ShutdownCause {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => ShutdownCause::Signal("interrupt"),
                _ = self.terminate.recv() => ShutdownCause::Signal("terminate"),
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Ctrl+C handler failed: {e}");
                std::future::pending::<()>().await;
            }
            ShutdownCause::Signal("interrupt")
        }
    }
}
