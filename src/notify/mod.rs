//! Human-readable progress output.
//!
//! Diagnostics go to stderr; the JSON summary owns stdout.

pub mod console;

pub use console::ConsoleOutput;
