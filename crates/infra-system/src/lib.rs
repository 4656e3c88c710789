// ReconBridge Infrastructure - System Adapters
// Implements: ProcessRunner, settings loading

pub mod settings;
pub mod subprocess_runner;

pub use settings::Settings;
pub use subprocess_runner::SubprocessRunner;
