//! Error taxonomy for settings loading and suite collection.
//!
//! Every failure here is deterministic and data-dependent: nothing is retried,
//! errors propagate straight to the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::rules::BuildRule;

/// A settings source could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file is not {kind} file")]
    NotSettingsFile { kind: &'static str },

    #[error("config file does not exist at path \"{}\"", .path.display())]
    Missing { path: PathBuf },

    #[error("Unable to load file \"{}\": {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Import(#[from] ImportResolutionError),
}

/// No settings module is registered under the requested name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no settings module named \"{name}\"")]
pub struct ImportResolutionError {
    pub name: String,
}

/// A selector could not be resolved against the discovered suites.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectError {
    #[error("unable to collect suite \"{suite}\" (case: {}, test: {})", display_opt(.case), display_opt(.test))]
    Unresolved {
        suite: String,
        case: Option<String>,
        test: Option<String>,
    },
}

impl CollectError {
    pub fn unresolved(rule: &BuildRule) -> Self {
        CollectError::Unresolved {
            suite: rule.package.clone(),
            case: rule.case.clone(),
            test: rule.test.clone(),
        }
    }
}

/// A lookup against a pool, list or settings map missed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("suite \"{0}\" is not found")]
    Suite(String),

    #[error("setting \"{0}\" is not found")]
    Setting(String),
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_message_names_the_file() {
        let err = ConfigError::Load {
            path: PathBuf::from("settings.toml"),
            source: io::Error::new(io::ErrorKind::InvalidData, "bad"),
        };
        assert!(
            err.to_string()
                .starts_with("Unable to load file \"settings.toml\"")
        );
    }

    #[test]
    fn collect_error_lists_suite_case_and_test() {
        let rule = BuildRule::new("pkg.mod", Some("Case".to_string()), None);
        let err = CollectError::unresolved(&rule);
        assert_eq!(
            err.to_string(),
            "unable to collect suite \"pkg.mod\" (case: Case, test: -)"
        );
    }
}
