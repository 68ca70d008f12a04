//! Loading settings from registered modules and TOML files.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR, Path};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::core::settings::{ConfigStore, Namespace, SettingsSource};
use crate::error::{ConfigError, ImportResolutionError};

/// Suffix of declarative settings files.
pub const SETTINGS_SUFFIX: &str = "toml";

/// Name of the built-in defaults module.
pub const DEFAULTS_MODULE: &str = "collector.settings.defaults";

static MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+$")
        .expect("module name pattern compiles")
});

/// Settings modules addressable by dotted name.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Box<dyn SettingsSource>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`DEFAULTS_MODULE`] registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULTS_MODULE, defaults());
        registry
    }

    pub fn register(&mut self, name: &str, source: impl SettingsSource + 'static) {
        self.modules.insert(name.to_string(), Box::new(source));
    }

    pub fn resolve(&self, name: &str) -> Result<&dyn SettingsSource, ImportResolutionError> {
        self.modules
            .get(name)
            .map(|source| source.as_ref())
            .ok_or_else(|| ImportResolutionError {
                name: name.to_string(),
            })
    }
}

fn defaults() -> Namespace {
    Namespace::new()
        .with("TESTS", toml::Value::Array(Vec::new()))
        .with("SUITES", toml::Value::Array(Vec::new()))
        .with("RANDOM", false)
        .with("GEVENT", false)
        .with("THREADING", false)
        .with("MULTIPROCESSING", false)
        .with("ASYNC_SUITES", false)
        .with("ASYNC_TESTS", false)
        .with("STEPS_LOG", false)
        .with("FLOWS_LOG", false)
        .with("VERBOSE", false)
}

/// How a config path given by the user is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Module,
    File,
    Unknown,
}

/// Classify `path`: a dotted identifier is a module unless its last segment is
/// the settings suffix; a `.toml` name or anything with a separator is a file.
pub fn classify_path(path: &str) -> PathKind {
    let suffix = format!(".{SETTINGS_SUFFIX}");
    if MODULE_NAME.is_match(path) && !path.ends_with(&suffix) {
        PathKind::Module
    } else if path.ends_with(&suffix) || path.contains(MAIN_SEPARATOR) || path.contains('/') {
        PathKind::File
    } else {
        PathKind::Unknown
    }
}

impl ConfigStore {
    /// Build a store from explicit options or a config path.
    ///
    /// Options win and are loaded without callables. A path is loaded as a
    /// module or file per [`classify_path`]; anything else loads nothing.
    pub fn init(
        options: Option<&dyn SettingsSource>,
        path: Option<&str>,
        modules: &ModuleRegistry,
    ) -> Result<Self, ConfigError> {
        let mut store = ConfigStore::new();
        if let Some(options) = options {
            store.load(options, false);
            return Ok(store);
        }
        let Some(path) = path else {
            return Ok(store);
        };
        match classify_path(path) {
            PathKind::Module => store.load_module(path, modules)?,
            PathKind::File => store.load_file(Path::new(path))?,
            PathKind::Unknown => debug!(path, "config path is neither module nor file"),
        }
        Ok(store)
    }

    /// Merge the public entries of the registered module `name`.
    pub fn load_module(
        &mut self,
        name: &str,
        modules: &ModuleRegistry,
    ) -> Result<(), ImportResolutionError> {
        let source = modules.resolve(name)?;
        let count = self.load(source, true);
        info!(module = name, count, "loaded settings module");
        Ok(())
    }

    /// Merge the top-level entries of a TOML settings file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(SETTINGS_SUFFIX) {
            return Err(ConfigError::NotSettingsFile {
                kind: SETTINGS_SUFFIX,
            });
        }
        let table = read_table(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.load(&table, true);
        info!(path = %path.display(), count, "loaded settings file");
        Ok(())
    }
}

fn read_table(path: &Path) -> io::Result<toml::Table> {
    let contents = fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
