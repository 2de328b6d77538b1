//! CLI module for the appconverge tool.
//!
//! This module provides the command-line interface for reading, planning
//! and uploading resources against a control plane.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
