//! CLI command definitions for the `msgchan` binary.
//!
//! Uses clap derive macros for argument parsing. Every command wires two
//! channel endpoints together over the selected transport and exercises them.

pub mod demo;
pub mod ping;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Exercise a pair of msgchan endpoints.
#[derive(Parser)]
#[command(name = "msgchan", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Path to a channel config.toml.
    #[arg(long, global = true, env = "MSGCHAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a notification and a fetch to a doubling listener.
    Demo {
        /// Transport connecting the two endpoints.
        #[arg(long, value_enum, default_value_t = TransportKind::Memory)]
        transport: TransportKind,
    },

    /// Issue many concurrent fetches against an echo listener.
    Ping {
        /// Number of fetches to issue.
        #[arg(long, default_value = "10")]
        count: u32,

        /// Per-fetch timeout in milliseconds.
        #[arg(long, default_value = "100")]
        timeout: u64,

        /// Make the echo listener ignore every N-th request.
        #[arg(long)]
        drop_every: Option<u32>,

        /// Transport connecting the two endpoints.
        #[arg(long, value_enum, default_value_t = TransportKind::Memory)]
        transport: TransportKind,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Transport used to connect the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// In-process message port (two bounded queues).
    Memory,
    /// Newline-delimited JSON over an in-process byte pipe.
    Stream,
}
