//! Cooperative cancellation for in-flight pipeline runs.
//!
//! A run can be aborted between sub-operations (host shutdown, operator
//! action). Cancellation stops the local waiting loops only; an external
//! side effect that is already in flight is left in whatever state the
//! backend put it.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply cloneable token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first reason is kept. Clones
/// share the same underlying state.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
}

impl CancelToken {
    /// Creates a new, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason. First reason wins.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.inner.reason.write() = Some(reason.into());
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Returns the reason, or a generic description when none was given.
    #[must_use]
    pub fn reason_or_default(&self) -> String {
        self.reason().unwrap_or_else(|| "run cancelled".to_string())
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_token_cancel() {
        let token = CancelToken::new();
        token.cancel("host shutting down");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("host shutting down".to_string()));
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancelToken::new();
        token.cancel("first reason");
        token.cancel("second reason");

        // First reason wins
        assert_eq!(token.reason(), Some("first reason".to_string()));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();

        clone.cancel("from the clone");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("from the clone".to_string()));
    }

    #[test]
    fn test_reason_or_default() {
        let token = CancelToken::new();
        assert_eq!(token.reason_or_default(), "run cancelled");
    }
}
