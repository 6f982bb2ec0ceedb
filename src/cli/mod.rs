//! Command-line interface for persona-forge.
//!
//! Provides commands for running simulation batches, recording persona
//! edits and exporting the prompt set.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
