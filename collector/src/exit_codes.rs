//! Stable exit codes for collector CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, settings, or other errors.
pub const INVALID: i32 = 1;
/// A selector did not resolve to a collected suite.
pub const UNRESOLVED: i32 = 2;
