//! Cancellable, deadline-bearing execution context.
//!
//! A [`Context`] is cheap to clone and is handed to every task of a batch.
//! Derived contexts inherit the cancellation signals and the deadline of
//! their parent, so cancelling a parent cancels every child.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docsmith_shared::Cancellation;
use futures::future::select_all;
use tokio::sync::watch;
use tokio::time::Instant;

/// Execution context shared by the tasks of a dispatch batch.
#[derive(Debug, Clone, Default)]
pub struct Context {
    signals: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels the context it was created with (and everything derived from it).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that can additionally be cancelled through the returned handle.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut signals = self.signals.clone();
        signals.push(rx);
        let ctx = Self {
            signals,
            deadline: self.deadline,
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }

    /// Derive a context expiring at `deadline`, or earlier if the parent does.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            signals: self.signals.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context expiring `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn error(&self) -> Option<Cancellation> {
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(Cancellation::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Cancellation {
        if let Some(reason) = self.error() {
            return reason;
        }

        let cancelled = async {
            if self.signals.is_empty() {
                return std::future::pending::<()>().await;
            }
            let waits = self.signals.iter().cloned().map(|mut rx| {
                Box::pin(async move {
                    let fired = rx.wait_for(|cancelled| *cancelled).await.map(|_| ());
                    // A dropped handle can no longer cancel.
                    if fired.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
            });
            select_all(waits).await;
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Cancellation::Cancelled,
            _ = expired => Cancellation::DeadlineExceeded,
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancellation> {
        if let Some(reason) = self.error() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `duration`, waking early with an error on cancellation.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancellation> {
        self.run(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_is_never_done() {
        let ctx = Context::background();
        assert_eq!(ctx.error(), None);
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn cancel_reaches_derived_contexts() {
        let (parent, handle) = Context::background().with_cancel();
        let (child, _child_handle) = parent.with_cancel();
        let child = child.with_timeout(Duration::from_secs(60));

        let waiter = tokio::spawn(async move { child.sleep(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("sleep should wake on cancel")
            .expect("join");
        assert_eq!(result, Err(Cancellation::Cancelled));
        assert_eq!(parent.error(), Some(Cancellation::Cancelled));
    }

    #[tokio::test]
    async fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(30));
        let started = std::time::Instant::now();
        let reason = ctx.done().await;
        assert_eq!(reason, Cancellation::DeadlineExceeded);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(ctx.error(), Some(Cancellation::DeadlineExceeded));
    }

    #[tokio::test]
    async fn child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn dropped_handle_does_not_cancel() {
        let (ctx, handle) = Context::background().with_cancel();
        drop(handle);
        let ctx = ctx.with_timeout(Duration::from_millis(30));
        assert_eq!(ctx.done().await, Cancellation::DeadlineExceeded);
    }
}
