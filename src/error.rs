use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("OpenAPI specification file is required")]
    SpecRequired,

    #[error("OpenAPI specification file not found: {}", .0.display())]
    SpecNotFound(PathBuf),

    #[error("OpenAPI specification path is not a file: {}", .0.display())]
    SpecNotAFile(PathBuf),

    #[error("Failed to load OpenAPI spec {}: {detail}", path.display())]
    EngineError { path: PathBuf, detail: String },

    #[error("Failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server has already been started")]
    AlreadyStarted,

    #[error("Cannot install signal handler: {0}")]
    SignalError(std::io::Error),

    #[error("{}", format_shutdown_timeout(.0))]
    ShutdownTimeout(Duration),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_shutdown_timeout(duration: &Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("Graceful shutdown did not complete within {}s", millis / 1000)
    } else {
        format!("Graceful shutdown did not complete within {millis}ms")
    }
}

impl ServerError {
    /// Error category string, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::SpecRequired => "config_error",
            ServerError::SpecNotFound(_) => "config_error",
            ServerError::SpecNotAFile(_) => "config_error",
            ServerError::EngineError { .. } => "engine_error",
            ServerError::BindFailed { .. } => "startup_error",
            ServerError::AlreadyStarted => "startup_error",
            ServerError::SignalError(_) => "startup_error",
            ServerError::ShutdownTimeout(_) => "shutdown_error",
            ServerError::IoError(_) => "io_error",
        }
    }

    /// Errors after which the process should still exit successfully.
    ///
    /// A shutdown timeout is followed by a forced close, so the server did stop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ServerError::ShutdownTimeout(_))
    }
}
