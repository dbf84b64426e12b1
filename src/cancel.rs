// Cancellation flags for fetch operations.
// Advisory: an in-flight request keeps running, only its observable effects are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-operation cancellation marker.
///
/// Clones share the same flag. Once cancelled it never resets; a new
/// operation gets a new flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
