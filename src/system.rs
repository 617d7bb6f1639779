//! The system: owns the root-level "runner" that acts as a synthetic
//! parent for top-level actors, the process-wide actor-path registry, and
//! the shared [`Config`]/[`slog::Logger`] that every cell is built from.
//!
//! In the style of riker's `kernel::provider::Provider` (the path registry
//! backing `AlreadyExists`, here on `dashmap::DashMap` exactly as riker
//! uses it) and `SystemBuilder`/`ActorSystem::create` for the shape of
//! system construction, simplified to this crate's single closed `Message`
//! type: there is one `System`, not one generic over an actor's message
//! type.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use slog::{error, info, o, warn, Logger};
use std::sync::Arc;
use uuid::Uuid;

use crate::cell::{ActorRef, Handler};
use crate::config::Config;
use crate::error::{CreateError, LifecycleMisuse};
use crate::logging::default_log;
use crate::procedure::Body;
use crate::protocol::Supervision;
use crate::validate::{validate_name, validate_path};

/// The process-wide actor-path registry, consulted on every spawn so two
/// siblings can never share a name. Cloned down into every cell so a child
/// can register/unregister its own path without routing back through
/// `System`.
#[derive(Clone)]
pub(crate) struct Provider {
    paths: Arc<DashMap<String, ()>>,
}

impl Provider {
    fn new() -> Self {
        Provider {
            paths: Arc::new(DashMap::new()),
        }
    }

    pub(crate) fn register(&self, path: &str) -> Result<(), CreateError> {
        match self.paths.entry(path.to_string()) {
            Entry::Occupied(_) => Err(CreateError::AlreadyExists(path.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(())
            }
        }
    }

    pub(crate) fn unregister(&self, path: &str) {
        self.paths.remove(path);
    }
}

/// The synthetic parent of every root-level cell. Implements the same
/// upward-facing contract an ordinary parent cell would (receiving
/// `Supervision` reports), but logs rather than acting on them and drives
/// no further supervision policy of its own: it is an externally supplied
/// terminal sink, not a strategy.
#[derive(Clone)]
pub struct Runner {
    log: Logger,
}

impl Runner {
    fn new(log: Logger) -> Self {
        Runner { log }
    }

    pub(crate) fn report(&self, sup: Supervision) {
        match sup {
            Supervision::Stopped(child) => {
                info!(self.log, "root actor stopped"; "path" => child.path());
            }
            Supervision::StoppedUnclean(child, reason) => {
                warn!(self.log, "root actor stopped uncleanly";
                    "path" => child.path(), "reason" => %reason);
            }
            Supervision::Error(child, failure, during_startup) => {
                error!(self.log, "root actor errored"; "path" => child.path(),
                    "error" => %failure, "during_startup" => during_startup);
            }
        }
    }
}

/// Owns the root of the actor tree, the shared [`Config`], the shared
/// `slog::Logger` and the path registry. In the shape of riker's
/// `ActorSystem`/`SystemBuilder` pair: `System::new()` loads layered
/// config the way `ActorSystem::new` calls `load_config()`, and
/// `spawn_root_*` plays the role of `sys_actor_of` for top-level actors.
#[derive(Clone)]
pub struct System {
    id: Uuid,
    log: Logger,
    config: Config,
    provider: Provider,
    runner: Runner,
}

impl System {
    /// Builds a system from layered configuration (compiled defaults,
    /// optionally amended by the file named in `KINFOLK_CONF`).
    pub fn new() -> Self {
        System::with_config(Config::load())
    }

    pub fn with_config(config: Config) -> Self {
        let id = Uuid::new_v4();
        let log = default_log().new(o!("system_id" => id.to_string()));
        info!(log, "starting actor system";
            "debug" => config.debug,
            "mailbox.high_water_mark" => config.mailbox.high_water_mark,
            "dispatcher.pool_size" => config.dispatcher.pool_size);
        System {
            id,
            log: log.clone(),
            config,
            provider: Provider::new(),
            runner: Runner::new(log),
        }
    }

    /// The unique identity assigned to this system instance at construction.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.log
    }

    /// Spawns and starts a root-level procedure cell under the runner.
    pub fn spawn_root_procedure(&self, name: &str, body: Body) -> Result<ActorRef, CreateError> {
        let path = self.register_root(name)?;
        let log = self.log.new(o!("path" => path.clone()));
        let root = ActorRef::new_root_procedure(
            path,
            body,
            self.runner.clone(),
            log,
            self.provider.clone(),
            self.config.mailbox.high_water_mark,
        );
        root.start().expect("freshly built root is NOT_STARTED");
        Ok(root)
    }

    /// Spawns and starts a root-level stateless-handler cell under the
    /// runner.
    pub fn spawn_root_handler(&self, name: &str, handler: Handler) -> Result<ActorRef, CreateError> {
        let path = self.register_root(name)?;
        let log = self.log.new(o!("path" => path.clone()));
        let root = ActorRef::new_root_handler(
            path,
            handler,
            self.runner.clone(),
            log,
            self.provider.clone(),
            self.config.mailbox.high_water_mark,
        );
        root.start().expect("freshly built root is NOT_STARTED");
        Ok(root)
    }

    fn register_root(&self, name: &str) -> Result<String, CreateError> {
        validate_name(name)?;
        let path = format!("/{name}");
        validate_path(&path)?;
        self.provider.register(&path)?;
        Ok(path)
    }

    /// Stops `root` and waits for its terminal signal, cascading through
    /// every descendant first.
    pub async fn shutdown(&self, root: &ActorRef) -> Result<(), LifecycleMisuse> {
        root.stop(false)?;
        root.terminal().await;
        Ok(())
    }
}

impl Default for System {
    fn default() -> Self {
        System::new()
    }
}
