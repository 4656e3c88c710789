// Process Runner Port
// Abstraction for running an external tool to completion with a bounded wait

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// What to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ProcessSpec {
    /// Full command line, for logging only
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a process that ran to completion
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Process Runner trait
///
/// Implementations must leave no child process behind on any exit path,
/// including the caller dropping the returned future.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a process and collect its output
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::Timeout if it outlives `spec.timeout` (it is killed first)
    /// - ExecutionError::IoError if its output cannot be read
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ExecutionError>;

    /// Check if a process is still alive
    fn is_alive(&self, pid: u32) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock runner behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 with the given stdout
        Output(String),
        /// Exit with the given code and stderr
        Fail { exit_code: i32, stderr: String },
        /// Report a timeout after N ms
        Timeout(u64),
        /// Fail to spawn with message
        SpawnFail(String),
    }

    /// Mock Process Runner for testing
    pub struct MockProcessRunner {
        behavior: Arc<Mutex<MockBehavior>>,
        delay: Option<Duration>,
        calls: Arc<Mutex<Vec<ProcessSpec>>>,
    }

    impl MockProcessRunner {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                delay: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
        pub fn new_output(stdout: impl Into<String>) -> Self {
            Self::new(MockBehavior::Output(stdout.into()))
        }
        pub fn new_fail(exit_code: i32, stderr: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail {
                exit_code,
                stderr: stderr.into(),
            })
        }
        /// Sleep before answering (keeps calls in flight)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
        pub fn calls(&self) -> Vec<ProcessSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ExecutionError> {
            self.calls.lock().unwrap().push(spec.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Output(stdout) => Ok(ProcessOutput {
                    pid: Some(4242),
                    exit_code: Some(0),
                    duration_ms: 10,
                    stdout,
                    stderr: String::new(),
                }),
                MockBehavior::Fail { exit_code, stderr } => Ok(ProcessOutput {
                    pid: Some(4242),
                    exit_code: Some(exit_code),
                    duration_ms: 10,
                    stdout: String::new(),
                    stderr,
                }),
                MockBehavior::Timeout(ms) => Err(ExecutionError::Timeout(ms)),
                MockBehavior::SpawnFail(msg) => Err(ExecutionError::SpawnFailed(msg)),
            }
        }
        fn is_alive(&self, _pid: u32) -> bool {
            false
        }
    }
}
