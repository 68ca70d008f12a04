//! Derivation of secondary execution flags from loaded settings.
//!
//! Only a backend label is chosen here; nothing is scheduled or spawned.

use std::fmt;

use serde::Serialize;
use toml::Value;
use tracing::debug;

use crate::core::settings::ConfigStore;

pub const LOGGING_SETTINGS: &str = "LOGGING_SETTINGS";
pub const GEVENT: &str = "GEVENT";
pub const THREADING: &str = "THREADING";
pub const MULTIPROCESSING: &str = "MULTIPROCESSING";
pub const ASYNC_SUITES: &str = "ASYNC_SUITES";
pub const ASYNC_TESTS: &str = "ASYNC_TESTS";
pub const STEPS_LOG: &str = "STEPS_LOG";
pub const FLOWS_LOG: &str = "FLOWS_LOG";
pub const VERBOSE: &str = "VERBOSE";

/// Receives the `LOGGING_SETTINGS` table.
pub trait LoggingSink {
    fn configure(&mut self, settings: &toml::Table);
}

/// Concurrency backend selected by the resolved flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gevent,
    Threading,
    Multiprocessing,
    Sequential,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Backend::Gevent => "gevent",
            Backend::Threading => "threading",
            Backend::Multiprocessing => "multiprocessing",
            Backend::Sequential => "sequential",
        };
        f.write_str(label)
    }
}

/// Resolve derived flags in one forward pass.
///
/// 1. A `LOGGING_SETTINGS` table goes to `sink`; any other value is ignored.
/// 2. `MULTIPROCESSING` becomes true when neither `GEVENT` nor `THREADING` is
///    set and `ASYNC_SUITES` or `ASYNC_TESTS` is.
/// 3. `VERBOSE` becomes true when `STEPS_LOG` or `FLOWS_LOG` is.
///
/// A flag that is already true is never demoted, so running this twice is the
/// same as running it once.
pub fn prepare(store: &mut ConfigStore, sink: &mut dyn LoggingSink) {
    if let Some(Value::Table(settings)) = store.value(LOGGING_SETTINGS) {
        sink.configure(settings);
    }

    let multiprocessing = store.flag(MULTIPROCESSING)
        || (!store.flag(GEVENT)
            && !store.flag(THREADING)
            && (store.flag(ASYNC_SUITES) || store.flag(ASYNC_TESTS)));
    store.set(MULTIPROCESSING, Value::Boolean(multiprocessing));

    let verbose = store.flag(VERBOSE) || store.flag(STEPS_LOG) || store.flag(FLOWS_LOG);
    store.set(VERBOSE, Value::Boolean(verbose));

    debug!(multiprocessing, verbose, "resolved derived flags");
}

/// Backend label for already prepared settings.
pub fn backend(store: &ConfigStore) -> Backend {
    if store.flag(GEVENT) {
        Backend::Gevent
    } else if store.flag(THREADING) {
        Backend::Threading
    } else if store.flag(MULTIPROCESSING) {
        Backend::Multiprocessing
    } else {
        Backend::Sequential
    }
}
