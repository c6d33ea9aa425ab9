//! Command line arguments
//!
//! Global flags configure logging and the configuration file; the
//! subcommand selects between running a broker and publishing a message.
//! Every flag is optional so configuration file values can fill the gaps.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobqueue")]
#[command(about = "Work queue broker for the orchestration control plane")]
#[command(version, long_version = crate::core::version::long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        global = true,
        value_parser = ["trace", "debug", "info", "warn", "error", "off"]
    )]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(
        short = 'o',
        long = "log-format",
        value_name = "FORMAT",
        global = true,
        value_parser = ["text", "simple", "ext", "json"]
    )]
    pub log_format: Option<String>,

    /// Color output (default: when stderr is a terminal)
    #[arg(short = 'g', long = "color", value_name = "BOOL", global = true)]
    pub color: Option<bool>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a broker and print every received message as a JSON line
    Serve(ServeArgs),
    /// Send one message to a running broker
    Publish(PublishArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct ServeArgs {
    /// Address to listen on (overrides queue-server)
    #[arg(short = 'b', long = "bind", value_name = "ADDR")]
    pub bind: Option<String>,

    /// Messages buffered in the broker before producers wait
    #[arg(long = "capacity", value_name = "COUNT")]
    pub capacity: Option<usize>,

    /// How long one poll waits for a message
    #[arg(long = "poll-timeout-ms", value_name = "MS")]
    pub poll_timeout_ms: Option<u64>,

    /// Put backs before a failing message is abandoned (0 = never)
    #[arg(long = "max-visits", value_name = "COUNT")]
    pub max_visits: Option<u32>,
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct PublishArgs {
    /// Broker address (overrides queue-server)
    #[arg(short = 's', long = "server", value_name = "ADDR")]
    pub server: Option<String>,

    /// Connection attempts before giving up
    #[arg(short = 'r', long = "retries", value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Message action, e.g. regenerate-apprc
    pub action: String,

    /// Message arguments
    pub args: Vec<String>,
}
