//! Session epochs.
//!
//! Every auth transition advances the epoch. Background work (report
//! fetches, directory refreshes, delayed re-fetches) captures a
//! [`SessionGuard`] when it starts and drops its result if the session it
//! belonged to has ended in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, monotonically increasing session counter
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch {
    current: Arc<AtomicU64>,
}

impl SessionEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch value
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Start a new epoch, invalidating all outstanding guards
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Capture the current epoch
    pub fn guard(&self) -> SessionGuard {
        SessionGuard {
            epoch: self.clone(),
            at: self.current(),
        }
    }
}

/// Snapshot of the epoch taken when a piece of work started
#[derive(Debug, Clone)]
pub struct SessionGuard {
    epoch: SessionEpoch,
    at: u64,
}

impl SessionGuard {
    /// Whether the session this guard was taken in is still active
    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_invalidated_by_advance() {
        let epoch = SessionEpoch::new();
        let guard = epoch.guard();
        assert!(guard.is_current());

        epoch.advance();
        assert!(!guard.is_current());
        assert!(epoch.guard().is_current());
    }

    #[test]
    fn test_clones_share_state() {
        let epoch = SessionEpoch::new();
        let other = epoch.clone();
        other.advance();
        assert_eq!(epoch.current(), 1);
    }
}
