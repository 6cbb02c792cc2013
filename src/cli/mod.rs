//! CLI module for archeval - command-line interface and subcommands.
//!
//! Provides the main entry point: architecture evaluation by default, plus
//! queue subcommands for the message-queue capability.

pub mod commands;

pub use commands::Cli;
