//! Config path lookup through environment variables.

use std::env;

/// Environment variable naming the settings source of a run.
pub const CONFIG_ENV: &str = "COLLECTOR_CONFIG";

/// Config path from the environment variable `key`, falling back to `default`.
///
/// `base_path` is prepended by plain string concatenation, not path joining.
/// Returns `None` when neither the variable nor `default` is set.
pub fn get_config_path_by_env(
    key: &str,
    default: Option<&str>,
    base_path: Option<&str>,
) -> Option<String> {
    config_path_from(|name| env::var(name).ok(), key, default, base_path)
}

/// [`get_config_path_by_env`] over an arbitrary variable lookup.
pub fn config_path_from<F>(
    lookup: F,
    key: &str,
    default: Option<&str>,
    base_path: Option<&str>,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).or_else(|| default.map(str::to_string))?;
    match base_path {
        Some(base) => Some(format!("{base}{value}")),
        None => Some(value),
    }
}
