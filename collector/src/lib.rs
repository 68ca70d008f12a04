//! Test-suite selection driven by selector commands.
//!
//! A run loads its settings, derives the execution flags, turns
//! `suite[:case[.test]]` selectors into build rules and lazily yields the
//! suites those rules select. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (selector parsing, rule matching,
//!   settings map, flag derivation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (settings files, settings modules,
//!   the process environment).
//!
//! [`collect`] drives the lazy traversals; [`run`] wires settings, collection
//! and the [`plan`] together for the CLI commands.

pub mod cli;
pub mod collect;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
