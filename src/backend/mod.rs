//! Backend tool driver - runs `arduino-cli` and relays its output
//!
//! # Structure
//!
//! - [`error`] - Error types for backend invocations
//! - [`process`] - Availability probe, captured and streamed commands
//! - [`stream`] - Line classification and progress-aware rendering

mod error;
mod process;
mod stream;

pub use error::BackendError;
pub use process::{
    Backend, RunStatus, DEFAULT_PROGRAM, INFO_TIMEOUT, LIST_TIMEOUT, PROBE_TIMEOUT,
};
pub use stream::{classify, LineKind, StreamRenderer, PROGRESS_LINE_WIDTH};
