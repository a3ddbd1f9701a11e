//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::record::RecordId;

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Name of the new stopwatch (defaults to the configured placeholder)
    pub name: Option<String>,
}

/// Arguments for commands acting on one stopwatch.
#[derive(Debug, Args)]
pub struct TargetCommand {
    /// Stopwatch id
    pub id: i64,
}

impl TargetCommand {
    /// The targeted record.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        RecordId::new(self.id)
    }
}

/// Rename command arguments.
#[derive(Debug, Args)]
pub struct RenameCommand {
    /// Stopwatch id
    pub id: i64,

    /// New name; surrounding whitespace is trimmed
    pub name: String,
}

impl RenameCommand {
    /// The targeted record.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        RecordId::new(self.id)
    }
}

/// Analytics command arguments.
#[derive(Debug, Args)]
pub struct AnalyticsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
