//! Command-line interface for yourtime.
//!
//! This module provides the CLI structure for the `yourtime` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    AddCommand, AnalyticsCommand, ConfigCommand, ListCommand, RenameCommand, TargetCommand,
};

/// yourtime - Track time across named stopwatches
///
/// Only one stopwatch runs at a time. Elapsed time is saved every second, so
/// an interrupted run loses at most one second.
#[derive(Debug, Parser)]
#[command(name = "yourtime")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stopwatches
    List(ListCommand),

    /// Create a stopwatch
    Add(AddCommand),

    /// Rename a stopwatch
    Rename(RenameCommand),

    /// Delete a stopwatch
    Delete(TargetCommand),

    /// Reset a stopwatch to zero
    Reset(TargetCommand),

    /// Run a stopwatch until interrupted with Ctrl-C
    Run(TargetCommand),

    /// Show how time is split across stopwatches
    Analytics(AnalyticsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
