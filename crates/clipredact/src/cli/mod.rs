//! Command-line interface for clipredact.
//!
//! This module provides the CLI structure for the `clipredact` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, LogsCommand, RulesCommand, RunCommand, ScanCommand, Toggle};

use crate::logging::Verbosity;

/// clipredact - Keep sensitive data out of your clipboard
///
/// Watches the system clipboard and replaces email addresses, phone numbers,
/// card numbers, SSNs, IP addresses and your own exact-match strings with
/// harmless placeholders.
#[derive(Debug, Parser)]
#[command(name = "clipredact")]
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
    /// Watch the clipboard and redact sensitive data until interrupted
    Run(RunCommand),

    /// Redact a piece of text once and print the result
    Scan(ScanCommand),

    /// View or modify detection rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// View or manage the redaction audit log
    #[command(subcommand)]
    Logs(LogsCommand),

    /// View or validate process configuration
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
