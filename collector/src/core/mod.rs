//! Deterministic, pure logic shared by the collector.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod resolve;
pub mod rules;
pub mod selector;
pub mod settings;
pub mod shuffle;
