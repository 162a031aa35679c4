pub mod lifecycle;
mod listener;
pub mod signal;

pub use lifecycle::{LifecycleController, ServerState, ShutdownCause, ShutdownHandle};
pub use signal::ShutdownSignal;
