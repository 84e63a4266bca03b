//! Ctrl+C handling.
//!
//! While a backend command is streaming, Ctrl+C is absorbed: the runner sees
//! the request, stops the child and reports an interrupted status. Outside a
//! stream (for example at the board selection prompt) it ends the program.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit code reported for a user interruption (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Default)]
struct State {
    streaming: AtomicBool,
    requested: AtomicBool,
}

/// Shared interruption flag between the signal handler and the runner.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    state: Arc<State>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interruption request.
    ///
    /// Returns `true` if a running stream will pick it up, `false` if nobody
    /// is listening and the caller should exit on its own.
    pub fn trigger(&self) -> bool {
        self.state.requested.store(true, Ordering::SeqCst);
        self.state.streaming.load(Ordering::SeqCst)
    }

    /// Check if an interruption has been requested during the current stream.
    pub fn is_requested(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }

    /// Whether a runner currently owns Ctrl+C.
    pub fn is_streaming(&self) -> bool {
        self.state.streaming.load(Ordering::SeqCst)
    }

    /// Mark the start of a stream; the returned guard marks its end on drop.
    pub(crate) fn begin_stream(&self) -> StreamGuard {
        self.state.requested.store(false, Ordering::SeqCst);
        self.state.streaming.store(true, Ordering::SeqCst);
        StreamGuard {
            state: Arc::clone(&self.state),
        }
    }
}

pub(crate) struct StreamGuard {
    state: Arc<State>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.state.streaming.store(false, Ordering::SeqCst);
    }
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler(interrupt: &Interrupt) -> Result<(), ctrlc::Error> {
    let interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
        if interrupt.trigger() {
            log::debug!("Ctrl+C received, stopping backend command");
        } else {
            eprintln!("\nInterrupted by user");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })
}
