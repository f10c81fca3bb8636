//! Shared cancellation flag polled by workers at task-safe points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap-to-clone cancellation flag shared by every task in a session.
///
/// Workers poll the flag between epochs, between state iterations of the
/// spectral sum, between Monte-Carlo runs and between events in a chain. On
/// observing it they return immediately, leaving partial outputs; the caller
/// must treat the results of an aborted session as invalid.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag {
    flag: Arc<AtomicBool>,
}

impl AbortFlag {
    /// Creates a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every worker sharing this flag.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clears the flag so the session can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}
