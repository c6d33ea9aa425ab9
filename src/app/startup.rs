//! Application startup: arguments, configuration, logging, dispatch

use super::cli::{Args, Command, Settings};
use super::commands;
use crate::core::logging::init_logging;
use clap::Parser;
use std::io::IsTerminal;

/// Run the command line application and return the process exit code
pub async fn startup() -> i32 {
    let args = Args::parse();

    let settings = match Settings::resolve(&args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let use_color = settings
        .color
        .unwrap_or_else(|| std::io::stderr().is_terminal());
    if let Err(e) = init_logging(
        settings.log_level.as_deref(),
        settings.log_format,
        settings.log_file.as_deref(),
        use_color,
    ) {
        eprintln!("Error initialising logging: {}", e);
        return 1;
    }
    log::debug!("Resolved settings: {:?}", settings);

    let result = match &args.command {
        Command::Serve(_) => commands::serve(&settings).await,
        Command::Publish(publish) => commands::publish(&settings, publish).await,
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            1
        }
    }
}
