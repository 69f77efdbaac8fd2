//! Cancellation-aware execution context threaded through every source call.

use tokio::sync::watch;

/// Handed to every [`crate::PlatformSource`] call and to the collector.
///
/// Cloning is cheap; all clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct CollectContext {
    cancelled: watch::Receiver<bool>,
}

/// The sending half of a [`CollectContext`]. Cancelling is idempotent.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CollectContext {
    /// A new context together with the handle that cancels it.
    #[must_use]
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { cancelled: rx })
    }

    /// A context that is never cancelled.
    #[must_use]
    pub fn background() -> Self {
        let (_handle, ctx) = Self::new();
        ctx
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the context is cancelled. Never resolves for a
    /// [`CollectContext::background`] context.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn new_context_is_not_cancelled() {
        let (_handle, ctx) = CollectContext::new();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_to_all_clones() {
        let (handle, ctx) = CollectContext::new();
        let clone = ctx.clone();
        handle.cancel();
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert!(clone.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let (handle, ctx) = CollectContext::new();
        let waiter = tokio::spawn(async move { ctx.cancelled().await });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .expect("task should not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn background_context_never_resolves() {
        let ctx = CollectContext::background();
        let result = tokio::time::timeout(Duration::from_secs(60), ctx.cancelled()).await;
        assert!(result.is_err(), "background context must never cancel");
        assert!(!ctx.is_cancelled());
    }
}
