//! Cooperative cancellation — deadline plus user signal
//!
//! One root token is tied to the global time limit; per-root child
//! tokens share the parent's state and can be cancelled independently
//! when their producer completes or errors fatally. Every blocking
//! stage in the pipeline checks its token between work items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CancelToken {
    deadline: Option<Instant>,
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn with_timeout(limit: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + limit),
            flag: Arc::new(AtomicBool::new(false)),
            parent: None,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            flag: Arc::new(AtomicBool::new(false)),
            parent: None,
        }
    }

    /// Child sharing this token's deadline and observing its flag.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(self.flag.clone()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Acquire) {
            return true;
        }
        if let Some(parent) = &self.parent {
            if parent.load(Ordering::Acquire) {
                return true;
            }
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Whether the deadline (rather than an explicit cancel) fired.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_cancel_propagates_to_children() {
        let root = CancelToken::unbounded();
        let child = root.child();
        assert!(!child.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let root = CancelToken::unbounded();
        let child = root.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_deadline_in_past_cancels() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        assert!(token.deadline_exceeded());
    }
}
