//! Deadlines and cancellation for dispatch calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Carries an optional deadline and cancellation signal into a dispatch.
///
/// Contexts are cheap to clone; clones observe the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels the contexts it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a copy expiring after `timeout`, or earlier if already due.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy expiring at `deadline`, or earlier if already due.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Returns a cancellable copy and the handle that cancels it.
    ///
    /// The copy is also cancelled when this context is.
    pub fn with_cancel(self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        if let Some(parent) = self.cancel.clone() {
            let child = Arc::clone(&tx);
            tokio::spawn(async move {
                let mut parent = parent;
                tokio::select! {
                    res = parent.wait_for(|cancelled| *cancelled) => {
                        if res.is_ok() {
                            child.send_replace(true);
                        }
                    }
                    _ = child.closed() => {}
                }
            });
        }
        let ctx = Self {
            deadline: self.deadline,
            cancel: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Completes when cancellation is signalled; pending forever otherwise.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // the handle was dropped without cancelling
            std::future::pending::<()>().await;
        }
    }

    /// Completes at the deadline; pending forever without one.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// The deadline, or `now + fallback` when none is set.
    pub(crate) fn deadline_or(&self, fallback: Duration) -> Instant {
        self.deadline.unwrap_or_else(|| Instant::now() + fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_cancels() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline().is_none());
        let waited = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_cancel() {
        let (ctx, handle) = Context::background().with_cancel();
        let clone = ctx.clone();
        handle.cancel();
        assert!(clone.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), ctx.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_child_follows_parent() {
        let (parent, handle) = Context::background().with_cancel();
        let (child, _child_handle) = parent.with_cancel();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(500), child.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deadline_takes_earliest() {
        let ctx = Context::background()
            .with_timeout(Duration::from_secs(60))
            .with_timeout(Duration::from_millis(10));
        assert!(ctx.deadline().unwrap() < Instant::now() + Duration::from_secs(1));
        ctx.expired().await;
        assert!(ctx.is_expired());
    }
}
