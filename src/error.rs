//! Top-level error type and exit code mapping.

use crate::backend::BackendError;
use crate::board::SelectError;
use crate::config::ConfigError;

/// Any failure that ends a sketchrun command.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Backend(e) => e.exit_code(),
            _ => 1,
        }
    }
}
