//! Ordered settings map and the sources it is loaded from.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use toml::Value;
use tracing::debug;

use crate::error::LookupError;

/// A callable registered as a setting.
pub type Callable = Rc<dyn Fn(&ConfigStore) -> Value>;

/// One settings value: plain data or a registered callable.
#[derive(Clone)]
pub enum Setting {
    Value(Value),
    Callable(Callable),
}

impl Setting {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Setting::Value(value) => Some(value),
            Setting::Callable(_) => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Setting::Callable(_))
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Value(value) => write!(f, "{value:?}"),
            Setting::Callable(_) => f.write_str("<callable>"),
        }
    }
}

impl PartialEq for Setting {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Setting::Value(left), Setting::Value(right)) => left == right,
            (Setting::Callable(left), Setting::Callable(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<Value> for Setting {
    fn from(value: Value) -> Self {
        Setting::Value(value)
    }
}

/// Something settings can be loaded from.
///
/// Implementors list every entry they hold, private ones included;
/// [`public_entries`] applies the visibility rules.
pub trait SettingsSource {
    fn entries(&self) -> Vec<(String, Setting)>;
}

impl SettingsSource for toml::Table {
    fn entries(&self) -> Vec<(String, Setting)> {
        self.iter()
            .map(|(name, value)| (name.clone(), Setting::Value(value.clone())))
            .collect()
    }
}

/// A settings source assembled in code, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Vec<(String, Setting)>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.entries
            .push((name.to_string(), Setting::Value(value.into())));
        self
    }

    pub fn with_callable(mut self, name: &str, callable: Callable) -> Self {
        self.entries
            .push((name.to_string(), Setting::Callable(callable)));
        self
    }
}

impl SettingsSource for Namespace {
    fn entries(&self) -> Vec<(String, Setting)> {
        self.entries.clone()
    }
}

/// Public entries of `source`, in source order.
///
/// Names starting with `_` are private and skipped. Callables are kept only
/// when `load_callable` is set, except uppercase constants, which are always
/// kept.
pub fn public_entries(source: &dyn SettingsSource, load_callable: bool) -> Vec<(String, Setting)> {
    source
        .entries()
        .into_iter()
        .filter(|(name, setting)| {
            if is_constant_name(name) {
                return true;
            }
            !name.starts_with('_') && (load_callable || !setting.is_callable())
        })
        .collect()
}

fn is_constant_name(name: &str) -> bool {
    name.starts_with(|ch: char| ch.is_ascii_uppercase())
        && name
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
}

/// Python-like truthiness of a settings value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(flag) => *flag,
        Value::Integer(number) => *number != 0,
        Value::Float(number) => *number != 0.0,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Table(table) => !table.is_empty(),
        Value::Datetime(_) => true,
    }
}

impl SettingsSource for ConfigStore {
    fn entries(&self) -> Vec<(String, Setting)> {
        self.iter()
            .map(|(name, setting)| (name.to_string(), setting.clone()))
            .collect()
    }
}

/// Normalized, ordered settings of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    settings: IndexMap<String, Setting>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the public entries of `source`; later entries overwrite earlier keys
    /// in place.
    pub fn load(&mut self, source: &dyn SettingsSource, load_callable: bool) -> usize {
        let entries = public_entries(source, load_callable);
        let count = entries.len();
        for (name, setting) in entries {
            self.settings.insert(name, setting);
        }
        debug!(count, load_callable, "merged settings");
        count
    }

    pub fn get(&self, key: &str) -> Result<&Setting, LookupError> {
        self.settings
            .get(key)
            .ok_or_else(|| LookupError::Setting(key.to_string()))
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.settings.get(key).and_then(Setting::as_value)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Setting>) {
        self.settings.insert(key.to_string(), value.into());
    }

    pub fn delete(&mut self, key: &str) -> Result<Setting, LookupError> {
        self.settings
            .shift_remove(key)
            .ok_or_else(|| LookupError::Setting(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    /// Truthiness of `key`; missing keys and callables read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.value(key).is_some_and(is_truthy)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_integer)
    }

    /// String items of an array setting; non-string items are skipped.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.value(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.settings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Setting)> {
        self.settings
            .iter()
            .map(|(key, setting)| (key.as_str(), setting))
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Plain values as a TOML table, callables omitted.
    pub fn to_table(&self) -> toml::Table {
        self.iter()
            .filter_map(|(key, setting)| {
                setting
                    .as_value()
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect()
    }
}
