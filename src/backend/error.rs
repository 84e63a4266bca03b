//! Backend tool error types

use std::time::Duration;

/// Errors that can occur while driving the backend tool.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Binary missing, not executable, or not answering the version probe
    #[error("{program} not found. Install it and ensure it is in your PATH.")]
    Unavailable { program: String },

    /// A captured command exited with a non-zero status
    #[error("Error running {command} (exit code {code}):\n{output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    /// A captured command did not finish within its time bound
    #[error("{command} timed out after {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    /// The child process could not be started
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while relaying output or waiting on the child
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Process exit code to report for this error.
    ///
    /// A failed backend command passes its own status through unchanged.
    pub fn exit_code(&self) -> i32 {
        match self {
            BackendError::CommandFailed { code, .. } => *code,
            _ => 1,
        }
    }
}
