//! CLI module containing argument parsing and configuration loading

pub mod args;
pub mod config;

pub use args::{Args, Command, PublishArgs, ServeArgs};
pub use config::{ConfigError, Settings};
