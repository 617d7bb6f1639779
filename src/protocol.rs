//! The supervisor protocol: the parent-visible message shapes a cell emits
//! on termination or failure, and the escalation policy around them. The
//! core only guarantees delivery and ordering; choosing a restart/stop/
//! escalate *strategy* in response is left to the parent's own handler, the
//! same split `spinoff`'s `report_to_parent` and riker's `SystemMsg::Failed`
//! + user-supplied `supervisor_strategy()` both draw.

use crate::cell::ActorRef;
use crate::error::Failure;

/// An upward message a child cell sends to its parent. Exactly one of these
/// is emitted per child per lifetime (`Stopped`/`StoppedUnclean`), except
/// `Error`, which may be emitted any number of times before the eventual
/// terminal message.
#[derive(Clone)]
pub enum Supervision {
    /// The child terminated normally (the body returned, or it was a
    /// stateless handler cell that was stopped without incident).
    Stopped(ActorRef),
    /// The child's `stop()` did not complete via the body's orderly exit:
    /// either it refused to unwind after cancellation, or it raised while
    /// unwinding.
    StoppedUnclean(ActorRef, UncleanReason),
    /// The child raised: a `BodyFailure` from a procedure body, or a
    /// `HandlerFailure` from a stateless handler. `during_startup` is
    /// reserved for a future startup-hook phase; the core has none today,
    /// so it is always `false`.
    Error(ActorRef, Failure, bool),
}

pub use crate::procedure::UncleanReason;

impl Supervision {
    pub fn child(&self) -> &ActorRef {
        match self {
            Supervision::Stopped(c) => c,
            Supervision::StoppedUnclean(c, _) => c,
            Supervision::Error(c, _, _) => c,
        }
    }
}

impl std::fmt::Debug for Supervision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Supervision::Stopped(c) => write!(f, "Supervision::Stopped({})", c.path()),
            Supervision::StoppedUnclean(c, reason) => {
                write!(f, "Supervision::StoppedUnclean({}, {:?})", c.path(), reason)
            }
            Supervision::Error(c, failure, during_startup) => write!(
                f,
                "Supervision::Error({}, {}, during_startup={})",
                c.path(),
                failure,
                during_startup
            ),
        }
    }
}
