//! Typed errors covering both synchronous misuse and asynchronous
//! escalation, in riker's `CreateError`/`MsgError` style: every kind is a
//! concrete type implementing `std::error::Error`, never a bare string.

use std::error::Error;
use std::fmt;

use crate::validate::{InvalidName, InvalidPath};

/// Caller-driven lifecycle misuse. Surfaced synchronously; never escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleMisuse {
    /// `send`/`pause`/an external-await resume was attempted on a cell that
    /// is not `RUNNING` (e.g. `NOT_STARTED` or `STOPPED`).
    ActorNotRunning,
    /// `start()` was called on a cell that is already `RUNNING` or `PAUSED`.
    ActorAlreadyRunning,
    /// `stop()` was called on a cell that has already reached `STOPPED`.
    ActorAlreadyStopped,
}

impl fmt::Display for LifecycleMisuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LifecycleMisuse::ActorNotRunning => "actor is not running",
            LifecycleMisuse::ActorAlreadyRunning => "actor is already running",
            LifecycleMisuse::ActorAlreadyStopped => "actor is already stopped",
        };
        f.write_str(msg)
    }
}

impl Error for LifecycleMisuse {}

/// `put` was called on a procedure body with no connected downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoRoute;

impl fmt::Display for NoRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("put() has no connected downstream actor")
    }
}

impl Error for NoRoute {}

/// A second `get` was issued while the first was still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxAwaiterConflict;

impl fmt::Display for MailboxAwaiterConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a get() is already outstanding on this mailbox")
    }
}

impl Error for MailboxAwaiterConflict {}

/// The body raised while running, or a stateless handler raised while
/// processing a `send`. Carries the raw error plus a rendered trace,
/// mirroring `spinoff`'s `(exc, trace)` escalation payload.
pub struct Failure {
    pub error: Box<dyn Error + Send + Sync>,
    pub trace: String,
}

impl Failure {
    pub fn new(error: impl Error + Send + Sync + 'static) -> Self {
        let trace = format!("{error:?}");
        Failure {
            error: Box::new(error),
            trace,
        }
    }

    pub fn from_boxed(error: Box<dyn Error + Send + Sync>) -> Self {
        let trace = format!("{error:?}");
        Failure { error, trace }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure").field("error", &self.trace).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Clone for Failure {
    fn clone(&self) -> Self {
        // Errors aren't generally `Clone`; the rendered trace is what
        // travels with escalation messages, so degrade to that.
        Failure {
            error: Box::new(RenderedFailure(self.trace.clone())),
            trace: self.trace.clone(),
        }
    }
}

#[derive(Debug)]
struct RenderedFailure(String);

impl fmt::Display for RenderedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for RenderedFailure {}

/// A body or handler explicitly reported a fault via `ctx.escalate(reason)`
/// without itself raising. Carries only a message: there is no underlying
/// `exc`/trace pair since nothing actually unwound.
#[derive(Debug)]
pub struct Escalated(pub String);

impl fmt::Display for Escalated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for Escalated {}

/// Top-level error for cell lifecycle operations.
#[derive(Debug)]
pub enum CellError {
    Lifecycle(LifecycleMisuse),
    NoRoute(NoRoute),
    AwaiterConflict(MailboxAwaiterConflict),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellError::Lifecycle(e) => write!(f, "{e}"),
            CellError::NoRoute(e) => write!(f, "{e}"),
            CellError::AwaiterConflict(e) => write!(f, "{e}"),
        }
    }
}

impl Error for CellError {}

impl From<LifecycleMisuse> for CellError {
    fn from(e: LifecycleMisuse) -> Self {
        CellError::Lifecycle(e)
    }
}

impl From<NoRoute> for CellError {
    fn from(e: NoRoute) -> Self {
        CellError::NoRoute(e)
    }
}

impl From<MailboxAwaiterConflict> for CellError {
    fn from(e: MailboxAwaiterConflict) -> Self {
        CellError::AwaiterConflict(e)
    }
}

/// Error type when an actor fails to spawn, in riker's `CreateError`
/// style.
#[derive(Debug)]
pub enum CreateError {
    InvalidName(InvalidName),
    InvalidPath(InvalidPath),
    AlreadyExists(String),
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::InvalidName(e) => write!(f, "failed to create actor: {e}"),
            CreateError::InvalidPath(e) => write!(f, "failed to create actor: {e}"),
            CreateError::AlreadyExists(path) => {
                write!(f, "failed to create actor: {path} already exists")
            }
        }
    }
}

impl Error for CreateError {}

impl From<InvalidName> for CreateError {
    fn from(e: InvalidName) -> Self {
        CreateError::InvalidName(e)
    }
}

impl From<InvalidPath> for CreateError {
    fn from(e: InvalidPath) -> Self {
        CreateError::InvalidPath(e)
    }
}
