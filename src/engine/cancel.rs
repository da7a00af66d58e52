//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared abort flag for a running gesture.
///
/// Checked before every batch and while waiting for a batch's instant. A
/// cancelled gesture still releases its contact; the release phase ignores
/// the token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread (or a signal
    /// handler thread).
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm the token for the next gesture.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
