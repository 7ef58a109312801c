// Cooperative cancellation for batch operations.

use std::sync::atomic::{AtomicBool, Ordering};

use tfvc_common::VcError;

/// Polled between elements of a batch; once it reports cancellation no
/// further elements are processed.
pub trait TaskMonitor: Send + Sync {
    fn is_cancelled(&self) -> bool;

    fn check(&self) -> Result<(), VcError> {
        if self.is_cancelled() {
            Err(VcError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancelled;

impl TaskMonitor for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct CancellationFlag {
    cancelled: AtomicBool,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl TaskMonitor for CancellationFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
