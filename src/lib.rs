//! sketchrun library crate.
//!
//! Drives `arduino-cli` to compile, upload and monitor sketches, picking the
//! board's serial port from `board list` when none is given.

pub mod backend;
pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod workflow;

pub use error::AppError;
