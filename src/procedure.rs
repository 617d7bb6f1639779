//! The suspendable-procedure driver: advances a linear, cooperative body
//! ("the actor procedure") that alternately awaits messages or external
//! awaitables, and injects `stop()` as a cancellation event at whichever
//! suspension point the body is currently parked on.
//!
//! The body is expressed as the host language's native cooperative-task
//! construct: an `async fn` over [`ProcedureCtx`], spawned as its own tokio
//! task rather than hand-rolled as a generator/state-machine enum. The
//! mailbox and the awaitable bridge already give each suspension point a
//! single, well-defined cancellation channel, so a plain `tokio::select!`
//! between "the awaited thing resolved" and "a cancellation was injected"
//! reproduces the `Deferred.cancel()` semantics of `spinoff`'s
//! `Process.get`/`Process.__shutdown`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use slog::warn;
use tokio::sync::{watch, Notify};

use crate::bridge::AwaitableBridge;
use crate::cell::ActorRef;
use crate::error::{Failure, NoRoute};
use crate::mailbox::{Resolution, TakeOutcome};
use crate::message::{Message, Pattern};

/// How long `stop()` waits for the body to unwind after cancellation is
/// injected before forcibly aborting it and reporting `RefusedToStop`. The
/// body only ever suspends through `ctx.get`/`ctx.external`, both of which
/// react to cancellation without actually blocking, so in the well-behaved
/// case this bound is never hit.
const CANCEL_GRACE: Duration = Duration::from_millis(500);

/// Returned by a cancelled suspension point. The body is not expected to
/// treat this as an error to propagate; it simply unwinds.
#[derive(Debug, Clone, Copy)]
pub struct Cancelled;

/// Why the driver settled: an orderly return, a raised failure, or an
/// unclean termination observed while `stop()` was cancelling the body.
pub enum DriverOutcome {
    /// The body returned while `RUNNING`, without ever being cancelled.
    Clean,
    /// The body raised while `RUNNING` (not during a stop-initiated unwind).
    /// Escalated to the parent as `BodyFailure`.
    Failed(Failure),
    /// The body finished (cleanly, by raising, or by never reacting) after
    /// cancellation was injected, but not via a prompt orderly return.
    Unclean(UncleanReason),
}

#[derive(Debug, Clone)]
pub enum UncleanReason {
    RefusedToStop,
    CleanupFailure(String),
}

impl std::fmt::Display for UncleanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UncleanReason::RefusedToStop => write!(f, "refused to stop"),
            UncleanReason::CleanupFailure(trace) => write!(f, "cleanup failure: {trace}"),
        }
    }
}

pub type BodyResult = Result<(), Failure>;
type BodyFuture = BoxFuture<'static, BodyResult>;
/// A boxed actor procedure: constructed once per spawn, consumed by the
/// driver when the cell starts.
pub type Body = Box<dyn FnOnce(ProcedureCtx) -> BodyFuture + Send>;

/// Wraps an `async fn(ProcedureCtx) -> BodyResult` into a [`Body`].
pub fn body<F, Fut>(f: F) -> Body
where
    F: FnOnce(ProcedureCtx) -> Fut + Send + 'static,
    Fut: Future<Output = BodyResult> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)))
}

/// Per-suspension cancellation gate shared between the driver and every
/// `ProcedureCtx` suspension point. `stop()` calls [`begin_cancel`], which
/// is delivered to whichever suspension is currently outstanding (or the
/// next one, if none is outstanding yet).
pub(crate) struct Suspension {
    notify: Notify,
    cancelling: AtomicBool,
    delivered_once: AtomicBool,
    refused: AtomicBool,
}

impl Suspension {
    fn new() -> Self {
        Suspension {
            notify: Notify::new(),
            cancelling: AtomicBool::new(false),
            delivered_once: AtomicBool::new(false),
            refused: AtomicBool::new(false),
        }
    }

    pub(crate) fn begin_cancel(&self) {
        self.cancelling.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub(crate) fn is_cancelling(&self) -> bool {
        self.cancelling.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has begun. The first suspension point to
    /// observe it is the orderly unwind point; any later one means the body
    /// re-suspended instead of exiting, i.e. refused to stop.
    pub(crate) async fn cancelled(&self) {
        if !self.is_cancelling() {
            self.notify.notified().await;
        }
        if self.delivered_once.swap(true, Ordering::SeqCst) {
            self.refused.store(true, Ordering::SeqCst);
        }
    }

    fn refused_to_stop(&self) -> bool {
        self.refused.load(Ordering::SeqCst)
    }
}

/// The body-authoring interface: the only surface a procedure's `async fn`
/// body is written against.
pub struct ProcedureCtx {
    pub(crate) cell: ActorRef,
    pub(crate) suspension: std::sync::Arc<Suspension>,
}

impl ProcedureCtx {
    /// The cell this body is running in.
    pub fn myself(&self) -> ActorRef {
        self.cell.clone()
    }

    /// Awaits the next message matching `pattern`. At most one `get` may be
    /// outstanding at a time; `&mut self` makes a second concurrent call a
    /// compile error rather than a runtime `MailboxAwaiterConflict`.
    pub async fn get(&mut self, pattern: Pattern) -> Result<Message, Cancelled> {
        let outcome = {
            let mut mbox = self.cell.mailbox_lock();
            mbox.take(pattern)
                .expect("at most one outstanding get is enforced by &mut self")
        };

        let rx = match outcome {
            TakeOutcome::Immediate(msg) => return Ok(msg),
            TakeOutcome::Pending(rx) => rx,
        };

        tokio::select! {
            biased;
            _ = self.suspension.cancelled() => {
                self.cell.mailbox_lock().cancel_awaiter();
                Err(Cancelled)
            }
            res = rx => match res {
                Ok(Resolution::Matched(msg)) => Ok(msg),
                Ok(Resolution::Cancelled) | Err(_) => Err(Cancelled),
            },
        }
    }

    /// Shorthand for `get(Pattern::Any)`.
    pub async fn get_any(&mut self) -> Result<Message, Cancelled> {
        self.get(Pattern::any()).await
    }

    /// Awaits an external asynchronous result, bridging it through the
    /// owning cell's pause/resume lifecycle (see [`crate::bridge`]).
    pub async fn external<F, T>(&mut self, future: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let awaitable = AwaitableBridge::spawn(future);
        let abort = awaitable.abort_handle();

        tokio::select! {
            biased;
            _ = self.suspension.cancelled() => {
                // If the task already finished, its result was sitting
                // cached (possibly through a pause) and is now discarded
                // rather than ever reaching the body.
                if abort.is_finished() {
                    warn!(self.cell.log(), "discarding external result on stop";
                        "path" => self.cell.path());
                }
                abort.abort();
                Err(Cancelled)
            }
            res = awaitable.resolve(&self.cell) => res.map_err(|_| Cancelled),
        }
    }

    /// Sends `message` to the single connected downstream, if any.
    pub fn put(&self, message: Message) -> Result<(), NoRoute> {
        self.cell.put(message)
    }

    /// Spawns a child procedure cell under this one.
    pub fn spawn(&self, name: &str, body: Body) -> Result<ActorRef, crate::error::CreateError> {
        self.cell.spawn_procedure(name, body)
    }

    /// Spawns a child stateless-handler cell under this one.
    pub fn spawn_handler(
        &self,
        name: &str,
        handler: crate::cell::Handler,
    ) -> Result<ActorRef, crate::error::CreateError> {
        self.cell.spawn_handler(name, handler)
    }

    /// Reports `reason` to the parent as an `error` without raising or
    /// changing this cell's state, the way `spinoff`'s `Process.escalate`
    /// schedules `report_to_parent` out of band rather than unwinding the
    /// coroutine (`spinoff/actor/process.py`).
    pub fn escalate(&self, reason: impl Into<String>) {
        self.cell.escalate_message(reason.into());
    }

    /// Sends `message` to the parent and resolves this cell's terminal
    /// signal, bypassing the usual `Supervision::Stopped` report. Intended
    /// as the body's last act before returning: the driver still observes
    /// a normal completion afterward, but the settle sequence this triggers
    /// has already run by the time it does, so no duplicate report or
    /// terminal resolution follows.
    pub async fn exit(&self, message: Message) {
        self.cell.exit(message).await;
    }
}

/// Drives one body to completion, classifying how it got there.
pub(crate) struct Driver {
    suspension: std::sync::Arc<Suspension>,
    outcome_rx: watch::Receiver<Option<DriverOutcome>>,
    abort: tokio::task::AbortHandle,
}

impl Driver {
    pub(crate) fn start(cell: ActorRef, body: Body) -> Self {
        let suspension = std::sync::Arc::new(Suspension::new());
        let (tx, rx) = watch::channel(None);

        let ctx = ProcedureCtx {
            cell,
            suspension: suspension.clone(),
        };
        let suspension_for_task = suspension.clone();
        let join = tokio::spawn(async move {
            let result = body(ctx).await;
            let outcome = classify(result, &suspension_for_task);
            let _ = tx.send(Some(outcome));
        });

        Driver {
            suspension,
            outcome_rx: rx,
            abort: join.abort_handle(),
        }
    }

    /// Injects cancellation at the current (or next) suspension point.
    pub(crate) fn cancel(&self) {
        self.suspension.begin_cancel();
    }

    /// A fresh, independently-polled view onto the eventual outcome. Safe
    /// to hand out freely since `watch::Receiver` is cheap to clone and a
    /// clone that never advances still observes the one-shot publish made
    /// by the body task.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<DriverOutcome>> {
        self.outcome_rx.clone()
    }

    /// Waits for the body to settle, with no bound — used to observe a
    /// natural completion that was not driven by `stop()`.
    pub(crate) async fn outcome(&self) -> DriverOutcome {
        let mut rx = self.subscribe();
        loop {
            if let Some(outcome) = rx.borrow().as_ref() {
                return outcome.clone_approx();
            }
            if rx.changed().await.is_err() {
                return DriverOutcome::Unclean(UncleanReason::CleanupFailure(
                    "driver task was dropped before producing an outcome".into(),
                ));
            }
        }
    }

    /// Cancels the body and waits (bounded by [`CANCEL_GRACE`]) for it to
    /// settle, forcibly aborting it if it never reacts.
    pub(crate) async fn stop_and_settle(&self) -> DriverOutcome {
        self.cancel();
        match tokio::time::timeout(CANCEL_GRACE, self.outcome()).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                self.abort.abort();
                DriverOutcome::Unclean(UncleanReason::RefusedToStop)
            }
        }
    }
}

impl DriverOutcome {
    /// `Failure` doesn't implement `Clone` faithfully (see
    /// [`crate::error::Failure::clone`]); this mirrors that degrade-to-trace
    /// behavior for the outcome enum itself.
    fn clone_approx(&self) -> DriverOutcome {
        match self {
            DriverOutcome::Clean => DriverOutcome::Clean,
            DriverOutcome::Failed(f) => DriverOutcome::Failed(f.clone()),
            DriverOutcome::Unclean(r) => DriverOutcome::Unclean(r.clone()),
        }
    }
}

fn classify(result: BodyResult, suspension: &Suspension) -> DriverOutcome {
    match result {
        Ok(()) if suspension.refused_to_stop() => {
            DriverOutcome::Unclean(UncleanReason::RefusedToStop)
        }
        Ok(()) => DriverOutcome::Clean,
        Err(failure) if suspension.is_cancelling() => {
            DriverOutcome::Unclean(UncleanReason::CleanupFailure(failure.trace.clone()))
        }
        Err(failure) => DriverOutcome::Failed(failure),
    }
}
