//! Test-suite collector.
//!
//! Loads the run settings, resolves the execution flags and prints the suites
//! a run would execute, in order.

use anyhow::{Context, Result};
use collector::cli::{Command, Invocation};
use collector::core::resolve::VERBOSE;
use collector::error::CollectError;
use collector::exit_codes;
use collector::io::config::ModuleRegistry;
use collector::logging;
use collector::run::{collect_plan, render_settings, resolve_settings};
use tracing::warn;

fn main() {
    let invocation = Invocation::parse();
    if let Err(err) = run(&invocation) {
        eprintln!("{:#}", err);
        let code = if err.downcast_ref::<CollectError>().is_some() {
            exit_codes::UNRESOLVED
        } else {
            exit_codes::INVALID
        };
        std::process::exit(code);
    }
}

fn run(invocation: &Invocation) -> Result<()> {
    let log = logging::init();
    let modules = ModuleRegistry::builtin();
    let (store, sink) = resolve_settings(invocation, &modules)?;
    if let Some(log) = &log {
        log.apply(sink.settings(), store.flag(VERBOSE))
            .context("apply LOGGING_SETTINGS")?;
    }
    if let Some(reason) = sink.rejected() {
        warn!(reason, "ignoring LOGGING_SETTINGS");
    }

    match invocation.command {
        Command::Collect { json } => {
            let plan = collect_plan(&store)?;
            if json {
                print!("{}", plan.render_json()?);
            } else {
                print!("{}", plan.render_text());
            }
        }
        Command::Config => print!("{}", render_settings(&store)?),
    }
    Ok(())
}
