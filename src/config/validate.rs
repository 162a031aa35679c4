use std::path::PathBuf;
use std::time::Duration;

use crate::error::ServerError;

use super::types::{ServeOptions, ServerConfig, ServerTimeouts};

/// Ensure a base path starts with `/`. An empty base path means the root.
pub fn normalize_base_path(base_path: &str) -> String {
    if base_path.is_empty() {
        "/".to_string()
    } else if base_path.starts_with('/') {
        base_path.to_string()
    } else {
        format!("/{base_path}")
    }
}

impl ServerConfig {
    /// Validate command-line options into a [`ServerConfig`].
    ///
    /// Only the spec path is checked here; whether the file actually parses
    /// is left to the engine.
    pub fn from_options(opts: ServeOptions) -> Result<Self, ServerError> {
        let spec = opts.spec.unwrap_or_default();
        if spec.is_empty() {
            return Err(ServerError::SpecRequired);
        }

        let spec_path = PathBuf::from(spec);
        match std::fs::metadata(&spec_path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(ServerError::SpecNotAFile(spec_path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServerError::SpecNotFound(spec_path));
            }
            Err(e) => return Err(ServerError::IoError(e)),
        }

        let mut timeouts = ServerTimeouts::default();
        if let Some(ms) = opts.shutdown_timeout_ms {
            timeouts.shutdown = Duration::from_millis(ms);
        }

        Ok(Self {
            spec_path,
            host: opts.host,
            port: opts.port,
            base_path: normalize_base_path(&opts.base_path),
            timeouts,
        })
    }
}
