//! Construction of the system-wide [`slog::Logger`] that is cloned into every cell.

use slog::{Drain, Logger, o};

/// Builds the default logger: a term decorator feeding an async drain, matching
/// the setup most slog-based actor systems reach for when no custom drain is
/// supplied.
pub fn default_log() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}
