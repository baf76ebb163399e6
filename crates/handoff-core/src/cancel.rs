//! Cooperative cancellation for in-flight saves.
//!
//! A save that pumps a nested loop (filter subprocess, slow sink) has to
//! notice a user-initiated cancel between writes. The token is shared
//! between the dialog and the document's writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token shared across the save dialog and the writer.
///
/// Clones observe cancellation from any other clone.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check cancellation and return an error if cancelled.
    ///
    /// Convenience for write loops: `token.check()?;` between chunks.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation was cancelled")
    }
}

impl std::error::Error for CancelledError {}

impl From<CancelledError> for crate::error::HandoffError {
    fn from(_: CancelledError) -> Self {
        crate::error::HandoffError::SaveAborted {
            reason: crate::error::SaveAbortReason::UserCancelled,
        }
    }
}
