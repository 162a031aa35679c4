use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_PATH: &str = "/";

/// Raw, unvalidated server options as they arrive from the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeOptions {
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path", rename = "basePath")]
    pub base_path: String,
    #[serde(default, rename = "shutdownTimeoutMs")]
    pub shutdown_timeout_ms: Option<u64>,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            spec: None,
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            shutdown_timeout_ms: None,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

/// Deadlines applied by the listener and the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeouts {
    /// Time allowed for a client to send the request head.
    pub read: Duration,
    /// Time allowed to produce and write the response.
    pub write: Duration,
    /// Keep-alive connections with no request in flight are closed after this.
    pub idle: Duration,
    /// Bound on graceful shutdown before connections are forcibly closed.
    pub shutdown: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(5),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(120),
            shutdown: Duration::from_secs(5),
        }
    }
}

/// Validated server configuration. Built once by `ServerConfig::from_options`
/// and never mutated.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub spec_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub timeouts: ServerTimeouts,
}

impl ServerConfig {
    /// `host:port` as handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
