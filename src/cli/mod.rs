pub mod output;
pub mod serve;

pub use serve::{run_serve, serve};
