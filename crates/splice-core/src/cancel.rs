//! Cooperative cancellation of a running operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag a caller can set to stop an operation between steps.
///
/// A step that git is already applying always runs to completion; the driver
/// checks the flag only once git has stopped cleanly, then aborts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    requested: Arc<AtomicBool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the operation to stop at the next step boundary.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        assert!(!other.is_cancelled());

        handle.cancel();
        assert!(other.is_cancelled());

        other.clear();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let handle = CancelHandle::new();
        let remote = handle.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(handle.is_cancelled());
    }
}
