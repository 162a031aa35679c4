pub mod types;
pub mod validate;

pub use types::{ServeOptions, ServerConfig, ServerTimeouts};
pub use validate::normalize_base_path;
