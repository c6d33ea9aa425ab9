//! CLI argument parsing tests

use clap::Parser;
use jobqueue::app::cli::args::*;
use std::path::PathBuf;

#[test]
fn test_global_flags_before_subcommand() {
    let args = Args::try_parse_from([
        "jobqueue",
        "--log-level",
        "debug",
        "--log-file",
        "queue.log",
        "--color",
        "false",
        "serve",
    ])
    .unwrap();

    assert_eq!(args.log_level, Some("debug".to_string()));
    assert_eq!(args.log_file, Some(PathBuf::from("queue.log")));
    assert_eq!(args.color, Some(false));
    assert!(matches!(args.command, Command::Serve(_)));
}

#[test]
fn test_serve_flags() {
    let args = Args::try_parse_from([
        "jobqueue",
        "serve",
        "-b",
        "0.0.0.0:7500",
        "--capacity",
        "16",
        "--poll-timeout-ms",
        "250",
    ])
    .unwrap();

    let Command::Serve(serve) = args.command else {
        panic!("expected serve");
    };
    assert_eq!(serve.bind.as_deref(), Some("0.0.0.0:7500"));
    assert_eq!(serve.capacity, Some(16));
    assert_eq!(serve.poll_timeout_ms, Some(250));
    assert_eq!(serve.max_visits, None);
}

#[test]
fn test_publish_without_args() {
    let args = Args::try_parse_from(["jobqueue", "publish", "regenerate-apprc"]).unwrap();

    let Command::Publish(publish) = args.command else {
        panic!("expected publish");
    };
    assert_eq!(publish.action, "regenerate-apprc");
    assert!(publish.args.is_empty());
    assert_eq!(publish.retries, None);
}

#[test]
fn test_subcommand_is_required() {
    assert!(Args::try_parse_from(["jobqueue", "--log-level", "info"]).is_err());
}

#[test]
fn test_rejects_unknown_log_level() {
    assert!(Args::try_parse_from(["jobqueue", "-l", "loud", "serve"]).is_err());
}

#[test]
fn test_rejects_non_numeric_capacity() {
    assert!(Args::try_parse_from(["jobqueue", "serve", "--capacity", "lots"]).is_err());
}
