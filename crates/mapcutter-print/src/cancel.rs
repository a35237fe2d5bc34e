//! Cooperative cancellation and progress reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag asking a print run to stop after the current sheet.
///
/// Clones share the flag, so one clone can be handed to the code that
/// requests cancellation while the run polls another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that is not canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`CancelToken::cancel`] was called on any clone.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}

/// Progress of a print run, reported after every sheet and once more
/// when the run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Sheets finished so far.
    pub current: usize,
    /// Sheets in the run.
    pub total: usize,
    /// Whether the run was canceled.
    pub canceled: bool,
}

impl Progress {
    /// Completed fraction in `[0, 1]`. An empty run counts as complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}
