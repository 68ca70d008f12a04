//! Tracing setup for the collector binary.
//!
//! The subscriber is installed before settings are loaded, filtered by
//! `RUST_LOG` or `warn`. Once settings are resolved, [`LogHandle::apply`]
//! swaps in the `filter` from `LOGGING_SETTINGS`, or `info` for verbose runs.
//! `RUST_LOG` always wins.

use std::io;

use serde::Deserialize;
use tracing_subscriber::fmt::format::{Compact, DefaultFields, Format};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::core::resolve::LoggingSink;

type Filtered = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type StderrLayer = fmt::Layer<Filtered, DefaultFields, Format<Compact>, fn() -> io::Stderr>;

/// Recognized keys of the `LOGGING_SETTINGS` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, e.g. `collector=debug`.
    pub filter: Option<String>,
    pub ansi: Option<bool>,
}

/// Keeps the logging table handed over during settings resolution.
#[derive(Debug, Default)]
pub struct SubscriberSink {
    settings: Option<LoggingSettings>,
    rejected: Option<String>,
}

impl SubscriberSink {
    pub fn settings(&self) -> Option<&LoggingSettings> {
        self.settings.as_ref()
    }

    /// Why the last table could not be used, if it could not.
    pub fn rejected(&self) -> Option<&str> {
        self.rejected.as_deref()
    }
}

impl LoggingSink for SubscriberSink {
    fn configure(&mut self, settings: &toml::Table) {
        match toml::Value::Table(settings.clone()).try_into::<LoggingSettings>() {
            Ok(parsed) => {
                self.settings = Some(parsed);
                self.rejected = None;
            }
            Err(err) => self.rejected = Some(err.to_string()),
        }
    }
}

/// Filter directives for a run without `RUST_LOG`.
pub fn default_directives(settings: Option<&LoggingSettings>, verbose: bool) -> String {
    match settings.and_then(|settings| settings.filter.clone()) {
        Some(filter) => filter,
        None if verbose => "info".to_string(),
        None => "warn".to_string(),
    }
}

fn stderr_layer(ansi: bool) -> StderrLayer {
    fmt::layer()
        .with_writer(io::stderr as fn() -> io::Stderr)
        .with_ansi(ansi)
        .compact()
}

/// Reload handles of the installed subscriber.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    output: reload::Handle<StderrLayer, Filtered>,
    from_env: bool,
}

impl LogHandle {
    /// Switch to the filter and colors derived from resolved settings.
    pub fn apply(
        &self,
        settings: Option<&LoggingSettings>,
        verbose: bool,
    ) -> Result<(), reload::Error> {
        if !self.from_env {
            self.filter
                .reload(EnvFilter::new(default_directives(settings, verbose)))?;
        }
        if let Some(ansi) = settings.and_then(|settings| settings.ansi) {
            self.output.reload(stderr_layer(ansi))?;
        }
        Ok(())
    }
}

/// Install the stderr subscriber. Returns `None` if one is already set.
pub fn init() -> Option<LogHandle> {
    let env = EnvFilter::try_from_default_env().ok();
    let from_env = env.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env.unwrap_or_else(|| EnvFilter::new("warn")));
    let (output, output_handle) = reload::Layer::new(stderr_layer(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .ok()?;
    Some(LogHandle {
        filter: filter_handle,
        output: output_handle,
        from_env,
    })
}
