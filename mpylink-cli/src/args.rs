use clap::{Args, Parser, Subcommand};

use crate::groups::Group;

/// Command line client for driving a MicroPython REPL over serial or TCP
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct App {
    /// Use the given serial port as backend (autodetected if omitted and
    /// --tcp isn't given either)
    #[arg(short, long)]
    pub serial: Option<String>,

    /// Serial port baud rate
    #[arg(short, long, default_value_t = 115200)]
    pub baud: u32,

    /// Connect over TCP to `host` or `host:port` (default port 23)
    /// instead of a serial port
    #[arg(long, conflicts_with = "serial")]
    pub tcp: Option<String>,

    /// Connection/read timeout, in milliseconds
    #[arg(short, long, default_value_t = 3000)]
    pub timeout: u64,

    #[command(flatten)]
    pub common: CommonArgs,

    /// Command group
    #[command(subcommand)]
    pub group: Group,
}

/// Flags shared by every subcommand.
#[derive(Debug, Args, Clone, Copy)]
pub struct CommonArgs {
    /// Print machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print extra detail for commands that have a terse default
    #[arg(short, long, global = true)]
    pub verbose: bool,
}
