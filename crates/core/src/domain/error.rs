// Domain Error Types

use crate::port::ExecutionError;
use thiserror::Error;

/// Per-adapter failures surfaced to the host's error channel
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{tool} is enabled but no path to the tool is set")]
    NotConfigured { tool: String },

    #[error("{tool} binary not found at {path}")]
    BinaryNotFound { tool: String, path: String },

    #[error("invalid input, refusing to run: {0}")]
    InvalidInput(String),

    #[error("unable to parse netblock {netblock}: {reason}")]
    UnparseableNetblock { netblock: String, reason: String },

    #[error("{tool} execution failed (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("timeout running {tool} on {target} after {timeout_ms}ms")]
    Timeout {
        tool: String,
        target: String,
        timeout_ms: u64,
    },

    #[error("error running {tool}: {source}")]
    Execution {
        tool: String,
        #[source]
        source: ExecutionError,
    },
}

impl AdapterError {
    /// Fatal errors latch the adapter into its disabled state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::NotConfigured { .. } | AdapterError::BinaryNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
