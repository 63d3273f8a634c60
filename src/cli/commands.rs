//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: start the scheduling driver in the foreground
//! - targets: print the demo registry in planning order

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reapr - a batch extraction scheduler for remote resource nodes
#[derive(Parser, Debug)]
#[command(name = "reapr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduling driver in the foreground against the demo
    /// environment
    Run {
        /// Stop after this many ticks instead of running until ctrl-c
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Print the demo registry's targets in planning order
    Targets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_with_ticks() {
        let cli = Cli::parse_from(["reapr", "run", "--ticks", "5"]);
        match cli.command {
            Some(Commands::Run { ticks }) => assert_eq!(ticks, Some(5)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_targets() {
        let cli = Cli::parse_from(["reapr", "targets"]);
        assert!(matches!(cli.command, Some(Commands::Targets)));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["reapr", "--verbose", "run"]);
        assert!(cli.is_verbose());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_defaults_to_no_command() {
        let cli = Cli::parse_from(["reapr"]);
        assert!(cli.command.is_none());
    }
}
