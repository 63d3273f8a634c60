//! CLI module for reapr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the driver
//! loop and inspecting the demo registry.

pub mod commands;

pub use commands::Cli;
