use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag the scanner polls between branches and between files.
///
/// Clones share the same flag, so a signal handler can hold one clone while
/// the scan runs on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
