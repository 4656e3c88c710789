// ReconBridge Core - Domain Logic, Ports & Tool Adapters
// NO infrastructure dependencies: processes and config files live in infra crates

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
