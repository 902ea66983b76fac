//! Tooling & Integration Layer
//!
//! Command-line surface over the restore engine and text rendering of its
//! results.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
