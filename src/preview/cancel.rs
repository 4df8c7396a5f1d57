//! Cooperative cancellation for in-flight raster operations
//!
//! The engine cancels a page render by flipping its token; the worker checks the
//! token before it starts and after it finishes, and reports `Cancelled` instead of
//! pixels. Cancellation is advisory: a raster that is already running is allowed to
//! finish, its output is simply never committed.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use super::request::RequestId;

/// Cancellation flag shared between the engine and the render worker
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Handle of a raster that has been issued to the worker and not yet settled
#[derive(Clone, Debug)]
pub struct RenderTask {
    pub id: RequestId,
    pub token: CancellationToken,
}

impl RenderTask {
    #[must_use]
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
        }
    }

    /// Best-effort cancel
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_cancellation() {
        let token = CancellationToken::new();
        let worker_side = token.clone();
        assert!(!worker_side.is_cancelled());

        token.cancel();
        assert!(worker_side.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let task = RenderTask::new(RequestId::new(7));
        task.cancel();
        task.cancel();
        assert!(task.token.is_cancelled());
    }
}
