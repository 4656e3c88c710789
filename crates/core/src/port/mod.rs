// Port Layer - Interfaces for external dependencies

pub mod event_listener;
pub mod process_runner;

// Re-exports
pub use event_listener::EventListener;
pub use process_runner::{ExecutionError, ProcessOutput, ProcessRunner, ProcessSpec};
