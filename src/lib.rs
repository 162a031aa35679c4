pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod recovery;
pub mod server;

pub use config::{ServeOptions, ServerConfig, ServerTimeouts};
pub use engine::{MockEngine, MockRequest, MockResponse, OpenApiEngine, RequestFault};
pub use error::ServerError;
pub use server::{LifecycleController, ServerState, ShutdownCause, ShutdownHandle, ShutdownSignal};
