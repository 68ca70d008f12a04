//! Command-line surface.
//!
//! Subcommands are derived with clap; settings options come from the
//! [`OPTIONS`] table and are turned into clap args by [`build_command`].

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use toml::Value;

use crate::collect::TESTS;
use crate::core::resolve::{
    ASYNC_SUITES, ASYNC_TESTS, FLOWS_LOG, GEVENT, MULTIPROCESSING, STEPS_LOG, THREADING, VERBOSE,
};
use crate::core::settings::ConfigStore;
use crate::core::shuffle::{RANDOM, RANDOM_SEED};
use crate::plan::SUITES;

#[derive(Parser, Debug)]
#[command(
    name = "collector",
    version,
    about = "Select and order test suites from selector commands"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the ordered suites a run would execute.
    Collect {
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved settings.
    Config,
}

/// How an option's raw value becomes a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Flag,
    Text,
    Integer,
    List,
}

/// One row of the options table.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub short: Option<char>,
    /// Settings key written by the option; `None` for options read directly.
    pub key: Option<&'static str>,
    pub kind: OptionType,
    /// Applied when neither the command line nor the settings source set the key.
    pub default: Option<&'static str>,
    pub help: &'static str,
    pub validator: Option<fn(&str) -> Result<(), String>>,
}

const fn flag(name: &'static str, key: &'static str, help: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        short: None,
        key: Some(key),
        kind: OptionType::Flag,
        default: Some("false"),
        help,
        validator: None,
    }
}

pub const CONFIG_OPTION: &str = "config";

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: CONFIG_OPTION,
        short: Some('c'),
        key: None,
        kind: OptionType::Text,
        default: None,
        help: "Settings module name or path to a .toml settings file",
        validator: Some(validate_non_empty),
    },
    OptionSpec {
        name: "tests",
        short: Some('t'),
        key: Some(TESTS),
        kind: OptionType::List,
        default: None,
        help: "Selector suite[:case[.test]]; repeat to select more",
        validator: Some(validate_non_empty),
    },
    OptionSpec {
        name: "suite",
        short: Some('s'),
        key: Some(SUITES),
        kind: OptionType::List,
        default: None,
        help: "Suite package to add to the pool; repeat to add more",
        validator: Some(validate_non_empty),
    },
    flag("random", RANDOM, "Shuffle the collected suites"),
    OptionSpec {
        name: "random-seed",
        short: None,
        key: Some(RANDOM_SEED),
        kind: OptionType::Integer,
        default: None,
        help: "Seed for --random",
        validator: Some(validate_integer),
    },
    flag("async-suites", ASYNC_SUITES, "Run suites concurrently"),
    flag("async-tests", ASYNC_TESTS, "Run tests concurrently"),
    flag("gevent", GEVENT, "Use green threads"),
    flag("threading", THREADING, "Use native threads"),
    flag("multiprocessing", MULTIPROCESSING, "Use worker processes"),
    flag("steps-log", STEPS_LOG, "Log every step"),
    flag("flows-log", FLOWS_LOG, "Log every flow"),
    flag("verbose", VERBOSE, "Verbose output"),
];

fn validate_non_empty(raw: &str) -> Result<(), String> {
    if raw.trim().is_empty() {
        return Err("value must be non-empty".to_string());
    }
    Ok(())
}

fn validate_integer(raw: &str) -> Result<(), String> {
    raw.parse::<i64>()
        .map(|_| ())
        .map_err(|err| format!("expected an integer: {err}"))
}

fn to_arg(spec: &OptionSpec) -> Arg {
    let mut arg = Arg::new(spec.name)
        .long(spec.name)
        .help(spec.help)
        .global(true);
    if let Some(short) = spec.short {
        arg = arg.short(short);
    }
    arg = match spec.kind {
        OptionType::Flag => arg.action(ArgAction::SetTrue),
        OptionType::Text | OptionType::Integer => arg.action(ArgAction::Set),
        OptionType::List => arg.action(ArgAction::Append),
    };
    if let Some(validator) = spec.validator {
        arg = arg.value_parser(move |raw: &str| validator(raw).map(|()| raw.to_string()));
    }
    arg
}

/// The `collector` command with every table option attached.
pub fn build_command() -> clap::Command {
    OPTIONS
        .iter()
        .fold(Cli::command(), |command, spec| command.arg(to_arg(spec)))
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: Command,
    pub config: Option<String>,
    /// Settings given on the command line, in table order.
    pub overrides: Vec<(&'static str, Value)>,
    /// Table defaults, applied only to keys the settings source left unset.
    pub defaults: Vec<(&'static str, Value)>,
}

impl Invocation {
    pub fn parse() -> Self {
        match Self::try_parse_from(std::env::args_os()) {
            Ok(invocation) => invocation,
            Err(err) => err.exit(),
        }
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = build_command().try_get_matches_from(args)?;
        let cli = Cli::from_arg_matches(&matches)?;
        let scoped = matches
            .subcommand()
            .map(|(_, sub)| sub)
            .unwrap_or(&matches);

        let mut config = None;
        let mut overrides = Vec::new();
        let mut defaults = Vec::new();
        for spec in OPTIONS {
            let Some(key) = spec.key else {
                if spec.name == CONFIG_OPTION {
                    config = scoped.get_one::<String>(spec.name).cloned();
                }
                continue;
            };
            if scoped.value_source(spec.name) == Some(ValueSource::CommandLine) {
                overrides.push((key, read_value(scoped, spec)));
            } else if let Some(default) = spec.default {
                defaults.push((key, parse_raw(spec.kind, default)));
            }
        }

        Ok(Self {
            command: cli.command,
            config,
            overrides,
            defaults,
        })
    }

    /// Write command-line settings over `store`, then fill unset defaults.
    pub fn apply(&self, store: &mut ConfigStore) {
        for (key, value) in &self.overrides {
            store.set(key, value.clone());
        }
        for (key, value) in &self.defaults {
            if !store.contains(key) {
                store.set(key, value.clone());
            }
        }
    }
}

fn read_value(matches: &ArgMatches, spec: &OptionSpec) -> Value {
    match spec.kind {
        OptionType::Flag => Value::Boolean(matches.get_flag(spec.name)),
        OptionType::List => Value::Array(
            matches
                .get_many::<String>(spec.name)
                .into_iter()
                .flatten()
                .map(|item| Value::String(item.clone()))
                .collect(),
        ),
        OptionType::Text | OptionType::Integer => matches
            .get_one::<String>(spec.name)
            .map(|raw| parse_raw(spec.kind, raw))
            .unwrap_or_else(|| Value::String(String::new())),
    }
}

fn parse_raw(kind: OptionType, raw: &str) -> Value {
    match kind {
        OptionType::Flag => Value::Boolean(matches!(raw, "true" | "1" | "yes")),
        OptionType::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        OptionType::List => Value::Array(vec![Value::String(raw.to_string())]),
        OptionType::Text => Value::String(raw.to_string()),
    }
}
