//! The actor cell: lifecycle state machine, owned mailbox, child set and
//! parent back-reference, in the style of riker's `actor_cell.rs` (state +
//! children + parent bookkeeping, paused-send buffering) and `actor_ref.rs`
//! (the cloneable, path-identified handle callers actually hold). Adapted
//! from riker's per-message-type generic `ActorRef<Msg>` to this crate's
//! single closed [`Message`] enum: there is one concrete cell shape, not one
//! per actor type, so the procedure driver lives directly on the cell
//! instead of behind a kernel dispatch table.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use slog::{debug, error, o, trace, warn, Logger};
use tokio::sync::Notify;

use crate::bridge::RunGate;
use crate::error::{CreateError, Escalated, Failure, LifecycleMisuse, NoRoute};
use crate::mailbox::Mailbox;
use crate::message::Message;
use crate::procedure::{Body, Driver, DriverOutcome, UncleanReason};
use crate::protocol::Supervision;
use crate::system::Provider;
use crate::validate::{validate_name, validate_path};

/// Lifecycle state of a cell: `NOT_STARTED` → `RUNNING` ↔ `PAUSED` →
/// `STOPPED`, with `STOPPED` absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotStarted,
    Running,
    Paused,
    Stopped,
}

/// A stateless message handler, invoked synchronously from `send`. Unlike
/// a procedure [`Body`], which is a suspendable `async fn`, a handler never
/// awaits: it runs to completion within the call to `send` that delivered
/// its message: a handler cell is the non-suspending counterpart to a
/// procedure body.
pub type Handler = Box<dyn FnMut(&ActorRef, Message) -> Result<(), Failure> + Send>;

enum Kind {
    Procedure {
        body: Mutex<Option<Body>>,
        driver: Mutex<Option<Arc<Driver>>>,
    },
    Handler(Mutex<Handler>),
}

/// The non-owning side of the parent/child relationship. Every cell but the
/// root of a tree is parented by another cell (held weakly, so a parent's
/// strong ownership of its children never closes a reference cycle); a root
/// is parented by the tree's synthetic [`crate::system::Runner`] instead.
pub(crate) enum ParentLink {
    Cell(Weak<Cell>),
    Runner(crate::system::Runner),
}

pub(crate) struct Cell {
    path: String,
    log: Logger,
    state: Mutex<State>,
    mailbox: Mutex<Mailbox>,
    buffer: Mutex<Vec<Message>>,
    parent: ParentLink,
    children: Mutex<Vec<ActorRef>>,
    downstream: Mutex<Option<ActorRef>>,
    kind: Kind,
    provider: Provider,
    high_water_mark: usize,
    stopping: AtomicBool,
    stopped: AtomicBool,
    terminal_notify: Notify,
    resumed_notify: Notify,
}

/// A cloneable, path-identified handle onto one actor cell. Cheap to clone
/// (an `Arc` bump); this is the type user code, the procedure driver and
/// the supervisor protocol all pass around.
#[derive(Clone)]
pub struct ActorRef(pub(crate) Arc<Cell>);

impl ActorRef {
    pub(crate) fn new_root_procedure(
        path: String,
        body: Body,
        runner: crate::system::Runner,
        log: Logger,
        provider: Provider,
        high_water_mark: usize,
    ) -> ActorRef {
        let kind = Kind::Procedure {
            body: Mutex::new(Some(body)),
            driver: Mutex::new(None),
        };
        ActorRef::build(
            path,
            kind,
            ParentLink::Runner(runner),
            log,
            provider,
            high_water_mark,
        )
    }

    pub(crate) fn new_root_handler(
        path: String,
        handler: Handler,
        runner: crate::system::Runner,
        log: Logger,
        provider: Provider,
        high_water_mark: usize,
    ) -> ActorRef {
        let kind = Kind::Handler(Mutex::new(handler));
        ActorRef::build(
            path,
            kind,
            ParentLink::Runner(runner),
            log,
            provider,
            high_water_mark,
        )
    }

    fn build(
        path: String,
        kind: Kind,
        parent: ParentLink,
        log: Logger,
        provider: Provider,
        high_water_mark: usize,
    ) -> ActorRef {
        ActorRef(Arc::new(Cell {
            path,
            log,
            state: Mutex::new(State::NotStarted),
            mailbox: Mutex::new(Mailbox::new(high_water_mark)),
            buffer: Mutex::new(Vec::new()),
            parent,
            children: Mutex::new(Vec::new()),
            downstream: Mutex::new(None),
            kind,
            provider,
            high_water_mark,
            stopping: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            terminal_notify: Notify::new(),
            resumed_notify: Notify::new(),
        }))
    }

    fn downgrade(&self) -> Weak<Cell> {
        Arc::downgrade(&self.0)
    }

    pub fn path(&self) -> &str {
        &self.0.path
    }

    pub fn state(&self) -> State {
        *self.0.state.lock().unwrap()
    }

    pub fn has_children(&self) -> bool {
        !self.0.children.lock().unwrap().is_empty()
    }

    /// Wires `downstream` as the single peer `put()` sends to.
    pub fn connect(&self, downstream: ActorRef) {
        *self.0.downstream.lock().unwrap() = Some(downstream);
    }

    // -- lifecycle --------------------------------------------------------

    /// Transitions `NOT_STARTED` → `RUNNING` and, for a procedure cell,
    /// begins driving its body. Returns a [`Terminal`] handle resolving when
    /// this cell reaches `STOPPED`. Exposed for callers that construct a
    /// cell and start it separately from [`ActorRef::spawn_procedure`]/
    /// [`ActorRef::spawn_handler`], which already call this as their last
    /// linking step of the spawn sequence.
    pub fn start(&self) -> Result<Terminal, LifecycleMisuse> {
        {
            let mut state = self.0.state.lock().unwrap();
            if *state != State::NotStarted {
                return Err(LifecycleMisuse::ActorAlreadyRunning);
            }
            *state = State::Running;
        }
        trace!(self.0.log, "started"; "path" => self.path());

        if let Kind::Procedure { body, driver } = &self.0.kind {
            let b = body
                .lock()
                .unwrap()
                .take()
                .expect("start() runs at most once, enforced by the NOT_STARTED check above");
            let d = Arc::new(Driver::start(self.clone(), b));
            *driver.lock().unwrap() = Some(d.clone());
            let watcher = self.clone();
            tokio::spawn(async move { watcher.watch_driver(d).await });
        }
        Ok(Terminal(self.clone()))
    }

    /// Awaits this cell's terminal signal: resolves exactly once, when the
    /// cell reaches `STOPPED`.
    pub async fn terminal(&self) {
        let notified = self.0.terminal_notify.notified();
        if self.0.stopped.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    pub fn pause(&self) -> Result<(), LifecycleMisuse> {
        self.pause_inner(true)
    }

    fn pause_inner(&self, strict: bool) -> Result<(), LifecycleMisuse> {
        {
            let mut state = self.0.state.lock().unwrap();
            if *state != State::Running {
                return if strict {
                    Err(LifecycleMisuse::ActorNotRunning)
                } else {
                    Ok(())
                };
            }
            *state = State::Paused;
        }
        trace!(self.0.log, "paused"; "path" => self.path());
        for child in self.0.children.lock().unwrap().iter() {
            let _ = child.pause_inner(false);
        }
        Ok(())
    }

    pub fn resume(&self) -> Result<(), LifecycleMisuse> {
        self.resume_inner(true)
    }

    fn resume_inner(&self, strict: bool) -> Result<(), LifecycleMisuse> {
        {
            let mut state = self.0.state.lock().unwrap();
            if *state != State::Paused {
                return if strict {
                    Err(LifecycleMisuse::ActorNotRunning)
                } else {
                    Ok(())
                };
            }
            *state = State::Running;
        }
        trace!(self.0.log, "resumed"; "path" => self.path());
        // Wake anything parked in the awaitable bridge before this cell's
        // own children resume and before buffered sends are replayed:
        // cached external results must land before any buffered send.
        self.0.resumed_notify.notify_waiters();
        for child in self.0.children.lock().unwrap().iter() {
            let _ = child.resume_inner(false);
        }
        let buffered: Vec<Message> = self.0.buffer.lock().unwrap().drain(..).collect();
        for msg in buffered {
            let _ = self.send(msg);
        }
        Ok(())
    }

    /// `silent = true` is used when a parent cascades `stop()` down to its
    /// children: the child still tears itself down fully, it simply does
    /// not emit `('stopped', self)` back up, since the parent already knows.
    pub fn stop(&self, silent: bool) -> Result<(), LifecycleMisuse> {
        if *self.0.state.lock().unwrap() == State::NotStarted {
            return Err(LifecycleMisuse::ActorNotRunning);
        }
        if self.0.stopping.swap(true, Ordering::SeqCst) {
            return Err(LifecycleMisuse::ActorAlreadyStopped);
        }
        {
            let mut state = self.0.state.lock().unwrap();
            if *state == State::Running {
                *state = State::Paused;
            }
        }
        let cell = self.clone();
        tokio::spawn(async move { cell.settle_from_stop(silent).await });
        Ok(())
    }

    /// The `exit(msg)` cell operation: lets a procedure
    /// body hand its parent an arbitrary payload instead of the fixed
    /// `Supervision::Stopped` shape, then resolves the terminal signal
    /// immediately rather than waiting for the body to actually return.
    /// Claims the same `stopping` flag `stop()` and the natural-completion
    /// watcher race on, so if the body calls this and then simply returns
    /// (the expected usage), the watcher sees `stopping` already set and
    /// skips its own settle sequence.
    pub(crate) async fn exit(&self, msg: Message) {
        if self.0.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.0.state.lock().unwrap();
            if *state == State::Running {
                *state = State::Paused;
            }
        }
        self.cascade_stop_children().await;
        self.mark_stopped();
        match &self.0.parent {
            ParentLink::Cell(weak) => {
                if let Some(parent) = weak.upgrade().map(ActorRef) {
                    if parent.send(msg).is_err() {
                        warn!(self.0.log, "parent already stopped, dropping exit message";
                            "path" => self.path());
                    }
                }
            }
            ParentLink::Runner(_) => {
                trace!(self.0.log, "exit() at root, message dropped"; "path" => self.path());
            }
        }
        self.unlink_from_parent();
    }

    // -- messaging ----------------------------------------------------------

    pub fn send(&self, message: Message) -> Result<(), LifecycleMisuse> {
        enum Action {
            Reject,
            Buffer,
            Dispatch,
        }
        let action = {
            let state = self.0.state.lock().unwrap();
            match *state {
                State::NotStarted | State::Stopped => Action::Reject,
                State::Paused => Action::Buffer,
                State::Running => Action::Dispatch,
            }
        };
        match action {
            Action::Reject => Err(LifecycleMisuse::ActorNotRunning),
            Action::Buffer => {
                self.0.buffer.lock().unwrap().push(message);
                Ok(())
            }
            Action::Dispatch => {
                self.dispatch(message);
                Ok(())
            }
        }
    }

    fn dispatch(&self, message: Message) {
        match &self.0.kind {
            Kind::Procedure { .. } => {
                let hwm = self.0.mailbox.lock().unwrap().enqueue(message);
                if let Some(event) = hwm {
                    warn!(self.0.log, "high water mark reached";
                        "path" => self.path(), "queue_length" => event.queue_length);
                }
            }
            Kind::Handler(handler) => {
                let result = {
                    let mut h = handler.lock().unwrap();
                    (h)(self, message)
                };
                if let Err(failure) = result {
                    error!(self.0.log, "handler failed"; "path" => self.path(), "error" => %failure);
                    // A stateless handler's failure is always escalated but
                    // never auto-stops the cell: the parent decides.
                    self.report_to_parent(Supervision::Error(self.clone(), failure, false));
                }
            }
        }
    }

    pub(crate) fn mailbox_lock(&self) -> std::sync::MutexGuard<'_, Mailbox> {
        self.0.mailbox.lock().unwrap()
    }

    pub(crate) fn log(&self) -> &Logger {
        &self.0.log
    }

    pub(crate) fn put(&self, message: Message) -> Result<(), NoRoute> {
        let downstream = self.0.downstream.lock().unwrap().clone();
        match downstream {
            Some(d) => {
                if d.send(message).is_err() {
                    warn!(self.0.log, "put() target is not running, message dropped";
                        "path" => self.path(), "target" => d.path());
                }
                Ok(())
            }
            None => Err(NoRoute),
        }
    }

    pub(crate) fn escalate_message(&self, reason: String) {
        let failure = Failure::new(Escalated(reason));
        self.report_to_parent(Supervision::Error(self.clone(), failure, false));
    }

    // -- spawn --------------------------------------------------------------

    pub fn spawn_procedure(&self, name: &str, body: Body) -> Result<ActorRef, CreateError> {
        self.spawn_cell(
            name,
            Kind::Procedure {
                body: Mutex::new(Some(body)),
                driver: Mutex::new(None),
            },
        )
    }

    pub fn spawn_handler(&self, name: &str, handler: Handler) -> Result<ActorRef, CreateError> {
        self.spawn_cell(name, Kind::Handler(Mutex::new(handler)))
    }

    fn spawn_cell(&self, name: &str, kind: Kind) -> Result<ActorRef, CreateError> {
        validate_name(name)?;
        let path = format!("{}/{}", self.path(), name);
        validate_path(&path)?;
        self.0.provider.register(&path)?;

        let log = self.0.log.new(o!("path" => path.clone()));
        let child = ActorRef::build(
            path,
            kind,
            ParentLink::Cell(self.downgrade()),
            log,
            self.0.provider.clone(),
            self.0.high_water_mark,
        );

        self.0.children.lock().unwrap().push(child.clone());
        // start() cannot fail here: the child was just constructed as
        // NOT_STARTED.
        child.start().expect("freshly spawned child is NOT_STARTED");
        Ok(child)
    }

    // -- supervision / teardown ----------------------------------------------

    async fn watch_driver(&self, driver: Arc<Driver>) {
        let outcome = driver.outcome().await;
        if self.0.stopping.swap(true, Ordering::SeqCst) {
            // stop() already claimed the settle sequence (it raced in
            // while the body was finishing on its own); let it finish.
            return;
        }
        self.settle_from_natural(outcome).await;
    }

    async fn settle_from_natural(&self, outcome: DriverOutcome) {
        self.cascade_stop_children().await;
        self.mark_stopped();
        match outcome {
            DriverOutcome::Clean => {
                self.report_to_parent(Supervision::Stopped(self.clone()));
            }
            DriverOutcome::Failed(failure) => {
                error!(self.0.log, "body raised"; "path" => self.path(), "error" => %failure);
                self.report_to_parent(Supervision::Error(self.clone(), failure, false));
            }
            DriverOutcome::Unclean(_) => {
                // A driver only reaches Unclean via cancellation, which
                // only stop() injects; stop() always claims `stopping`
                // before cancelling, so watch_driver never observes this.
                unreachable!("natural completion cannot classify as unclean")
            }
        }
        self.unlink_from_parent();
    }

    async fn settle_from_stop(&self, silent: bool) {
        let driver = match &self.0.kind {
            Kind::Procedure { driver, .. } => driver.lock().unwrap().clone(),
            Kind::Handler(_) => None,
        };
        let outcome = match driver {
            Some(d) => Some(d.stop_and_settle().await),
            None => None,
        };

        self.cascade_stop_children().await;
        self.mark_stopped();

        if !silent {
            let sup = match outcome {
                None | Some(DriverOutcome::Clean) => Supervision::Stopped(self.clone()),
                Some(DriverOutcome::Unclean(reason)) => {
                    warn!(self.0.log, "stopped uncleanly"; "path" => self.path(), "reason" => %reason);
                    Supervision::StoppedUnclean(self.clone(), reason)
                }
                Some(DriverOutcome::Failed(_)) => {
                    unreachable!("a cancelling driver never classifies as Failed")
                }
            };
            self.report_to_parent(sup);
        }
        self.unlink_from_parent();
    }

    async fn cascade_stop_children(&self) {
        let children: Vec<ActorRef> = self.0.children.lock().unwrap().clone();
        for child in &children {
            let _ = child.stop(true);
        }
        for child in &children {
            child.terminal().await;
        }
    }

    fn mark_stopped(&self) {
        *self.0.state.lock().unwrap() = State::Stopped;
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.terminal_notify.notify_waiters();
        debug!(self.0.log, "stopped"; "path" => self.path());
    }

    fn parent_cell(&self) -> Option<ActorRef> {
        match &self.0.parent {
            ParentLink::Cell(weak) => weak.upgrade().map(ActorRef),
            ParentLink::Runner(_) => None,
        }
    }

    fn report_to_parent(&self, sup: Supervision) {
        match &self.0.parent {
            ParentLink::Cell(weak) => {
                if let Some(parent) = weak.upgrade().map(ActorRef) {
                    if parent.send(Message::payload(sup)).is_err() {
                        warn!(self.0.log, "parent already stopped, dropping supervision message";
                            "path" => self.path());
                    }
                }
            }
            ParentLink::Runner(runner) => runner.report(sup),
        }
    }

    fn unlink_from_parent(&self) {
        if let Some(parent) = self.parent_cell() {
            parent.remove_child(self.path());
        }
        self.0.provider.unregister(self.path());
    }

    fn remove_child(&self, path: &str) {
        let mut children = self.0.children.lock().unwrap();
        if let Some(ix) = children.iter().position(|c| c.path() == path) {
            children.remove(ix);
        }
    }
}

impl RunGate for ActorRef {
    fn is_running(&self) -> bool {
        *self.0.state.lock().unwrap() == State::Running
    }

    fn resumed(&self) -> &Notify {
        &self.0.resumed_notify
    }
}

/// A one-shot handle onto a cell's terminal signal, returned by
/// [`ActorRef::start`]. Cloneable and cheap, like `ActorRef` itself.
#[derive(Clone)]
pub struct Terminal(ActorRef);

impl Terminal {
    /// Waits for the cell to reach `STOPPED`.
    pub async fn wait(&self) {
        self.0.terminal().await;
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActorRef({})", self.path())
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &ActorRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ActorRef {}
