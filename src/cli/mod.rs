//! Command line interface module
//!
//! This module provides argument parsing and the runner that executes the
//! `resolve`, `tags`, `digest` and `update` workflows.

pub mod args;
pub mod runner;

pub use args::{Args, Command, OutputFormat};
pub use runner::Runner;
