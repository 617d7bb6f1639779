//! kinfolk: a hierarchical actor runtime core -- lightweight, independently
//! scheduled actors that communicate exclusively through asynchronous
//! message delivery, organized in a parent/child supervision tree, whose
//! bodies are expressed either as a stateless message handler or as a
//! suspendable linear procedure awaiting messages and external async
//! results.
//!
//! Transport adapters, pipeline wiring sugar, process-level service
//! hosting and wire serialization are all left to callers; this crate is
//! the lifecycle and supervision engine they sit on top of.

pub mod bridge;
pub mod cell;
pub mod config;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod message;
pub mod procedure;
pub mod protocol;
pub mod system;
pub mod validate;

pub use cell::{ActorRef, Handler, State, Terminal};
pub use config::Config;
pub use error::{CellError, CreateError, Failure, LifecycleMisuse, NoRoute};
pub use message::{Message, Pattern};
pub use procedure::{body, Body, Cancelled, ProcedureCtx};
pub use protocol::{Supervision, UncleanReason};
pub use system::System;
