//! Wraps an external asynchronous result so the suspendable procedure can
//! pause on it while still honoring the owning cell's lifecycle: a paused
//! actor must not observe progress made by an awaited result, and a
//! cancelled one must not see the cancellation as a procedure failure.
//!
//! Mirrors `Process.__shutdown`, which calls `self._coroutine.cancel()` on
//! the underlying Twisted `Deferred` and treats a resulting
//! `CancelledError` as ordinary shutdown rather than a failure
//! (`spinoff/actor/process.py`). The Rust-idiomatic counterpart cancels a
//! spawned task via `JoinHandle::abort()`.

use std::future::Future;

use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};

/// Signals that the external awaitable's completion (or cancellation) was
/// swallowed because the cell initiated a `stop()`; the procedure driver
/// never surfaces this to the body as a failure.
#[derive(Debug, Clone, Copy)]
pub struct BridgeCancelled;

/// The gating condition the bridge consults before handing a resolved value
/// to the body: only a `RUNNING` cell may observe progress.
pub trait RunGate: Send + Sync {
    fn is_running(&self) -> bool;
    /// Notified once per `resume()`.
    fn resumed(&self) -> &Notify;
}

/// A handle over one external awaitable `X`, spawned as its own task so it
/// keeps making progress independent of whether the owning cell's body is
/// currently polled.
pub struct AwaitableBridge<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> AwaitableBridge<T> {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        AwaitableBridge {
            handle: tokio::spawn(future),
        }
    }

    /// Attempts to cancel the wrapped awaitable. Idempotent: aborting an
    /// already-finished task is a harmless no-op.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// A cheap, cloneable handle that can abort the awaitable from a
    /// sibling branch of a `select!` after `resolve` has already taken
    /// ownership of `self`.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Awaits `X`'s resolution, caching it (by simply not returning) until
    /// `gate` reports `RUNNING`. Returns `Err(BridgeCancelled)` if the task
    /// was aborted via [`cancel`](Self::cancel) before it produced a value.
    pub async fn resolve<G: RunGate>(self, gate: &G) -> Result<T, BridgeCancelled> {
        let value = match self.handle.await {
            Ok(value) => value,
            Err(join_err) if join_err.is_cancelled() => return Err(BridgeCancelled),
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        };

        while !gate.is_running() {
            gate.resumed().notified().await;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct TestGate {
        running: AtomicBool,
        resumed: Notify,
    }

    impl RunGate for TestGate {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn resumed(&self) -> &Notify {
            &self.resumed
        }
    }

    #[tokio::test]
    async fn resolves_immediately_when_running() {
        let gate = TestGate {
            running: AtomicBool::new(true),
            resumed: Notify::new(),
        };
        let bridge = AwaitableBridge::spawn(async { 42 });
        let value = bridge.resolve(&gate).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn defers_delivery_until_resume_notifies() {
        let gate = Arc::new(TestGate {
            running: AtomicBool::new(false),
            resumed: Notify::new(),
        });
        let bridge = AwaitableBridge::spawn(async { "result" });

        let gate2 = gate.clone();
        let waiter = tokio::spawn(async move { bridge.resolve(&*gate2).await });

        // Give the spawned external future a chance to resolve while the
        // cell is still paused; the waiter must not complete yet.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.running.store(true, Ordering::SeqCst);
        gate.resumed.notify_one();

        let value = waiter.await.unwrap().unwrap();
        assert_eq!(value, "result");
    }

    #[tokio::test]
    async fn cancel_swallows_as_bridge_cancelled() {
        let gate = TestGate {
            running: AtomicBool::new(true),
            resumed: Notify::new(),
        };
        let bridge = AwaitableBridge::spawn(async {
            std::future::pending::<()>().await;
        });
        bridge.cancel();
        let result = bridge.resolve(&gate).await;
        assert!(matches!(result, Err(BridgeCancelled)));
    }
}
