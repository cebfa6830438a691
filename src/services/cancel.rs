use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{RecommendError, RecommendResult};

/// Cooperative cancellation flag shared between a request and its correlation passes
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancellation point: fails with `Cancelled` once the token is set
    pub fn check(&self) -> RecommendResult<()> {
        if self.is_cancelled() {
            Err(RecommendError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Returns a guard that cancels this token when dropped
    ///
    /// Handlers hold the guard across the blocking computation, so a request dropped by the
    /// client aborts the work it started.
    pub fn drop_guard(&self) -> CancelGuard {
        CancelGuard {
            token: Some(self.clone()),
        }
    }
}

/// Cancels its token on drop unless disarmed
#[derive(Debug)]
pub struct CancelGuard {
    token: Option<CancelToken>,
}

impl CancelGuard {
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
