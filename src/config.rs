//! Layered configuration: compiled-in defaults, optionally amended by a TOML
//! file whose path is given by the `KINFOLK_CONF` environment variable.

use std::env;

use config::{Config as RawConfig, File};

#[derive(Clone, Debug)]
pub struct Config {
    pub debug: bool,
    pub mailbox: MailboxConfig,
    pub dispatcher: DispatcherConfig,
}

/// Mailbox-related tunables: the high-water-mark threshold at which
/// `HighWaterMarkReached` observability events fire, and the number of
/// messages a cell drains from its queue per scheduling turn.
#[derive(Clone, Debug)]
pub struct MailboxConfig {
    pub high_water_mark: usize,
    pub process_limit: usize,
}

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub pool_size: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        MailboxConfig {
            high_water_mark: 10_000,
            process_limit: 1000,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            pool_size: num_cpus::get() * 2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: true,
            mailbox: MailboxConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl Config {
    /// Loads the compiled-in defaults, then merges `$KINFOLK_CONF`
    /// (default `config/kinfolk.toml`) over them if the file exists. A
    /// missing file is not an error; a malformed one is silently ignored,
    /// a best-effort amendment over the compiled defaults.
    pub fn load() -> Self {
        let mut cfg = Config::default();

        let path = env::var("KINFOLK_CONF").unwrap_or_else(|_| "config/kinfolk.toml".into());
        let raw = RawConfig::builder()
            .add_source(File::with_name(&path).required(false))
            .build();

        if let Ok(raw) = raw {
            if let Ok(v) = raw.get_bool("debug") {
                cfg.debug = v;
            }
            if let Ok(v) = raw.get_int("mailbox.high_water_mark") {
                cfg.mailbox.high_water_mark = v as usize;
            }
            if let Ok(v) = raw.get_int("mailbox.process_limit") {
                cfg.mailbox.process_limit = v as usize;
            }
            if let Ok(v) = raw.get_int("dispatcher.pool_size") {
                cfg.dispatcher.pool_size = v as usize;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_with_no_file_present() {
        // Point at a path that cannot exist so `load` exercises the
        // defaults-only path deterministically.
        std::env::set_var("KINFOLK_CONF", "/nonexistent/kinfolk.toml");
        let cfg = Config::load();
        assert_eq!(cfg.mailbox.high_water_mark, 10_000);
        assert_eq!(cfg.mailbox.process_limit, 1000);
        assert!(cfg.dispatcher.pool_size >= 1);
    }
}
