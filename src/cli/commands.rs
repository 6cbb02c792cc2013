//! CLI command definitions using clap.
//!
//! The default surface evaluates an architecture description; the queue
//! subcommand group exposes the message-queue capability.

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

/// archeval - iterative cloud architecture evaluation with telemetry feedback
#[derive(Parser, Debug)]
#[command(name = "archeval")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Description of the cloud architecture to evaluate
    pub text: Option<String>,

    /// Cloud provider to pull telemetry from
    #[arg(long, value_enum)]
    pub cloud_provider: Option<CloudProvider>,

    /// Run the loop without collecting telemetry
    #[arg(long, conflicts_with = "cloud_provider")]
    pub no_telemetry: bool,

    /// Override the configured attempt budget
    #[arg(long)]
    pub max_attempts: Option<u32>,

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

/// Supported telemetry providers
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Aws,
    Azure,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Azure => write!(f, "azure"),
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Message queue operations
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
}

/// Queue subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum QueueCommands {
    /// Send a message to the queue
    Send {
        /// Message content
        content: String,
    },

    /// Receive messages from the queue
    Receive {
        /// Maximum number of messages to receive
        #[arg(long, default_value_t = 1)]
        max_count: usize,

        /// Maximum seconds to wait per message
        #[arg(long, default_value_t = 5)]
        max_wait_secs: u64,
    },
}
