//! Side-effecting collaborators: settings files, settings modules and the
//! process environment.

pub mod config;
pub mod env;
