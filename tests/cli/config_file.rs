//! Configuration file loading and precedence tests

use crate::common::config_file;
use clap::Parser;
use jobqueue::app::cli::{Args, ConfigError, Settings};
use jobqueue::core::logging::LogFormat;
use std::path::PathBuf;
use std::time::Duration;

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn test_file_values_apply() {
    let file = config_file(
        r#"
queue-server = "10.1.1.1:7500"
queue-capacity = 64
poll-timeout-ms = 500
max-visits = 0
log-format = "json"
log-file = "none"
"#,
    );
    let path = file.path().to_str().unwrap();

    let settings = Settings::resolve(&args(&["jobqueue", "-c", path, "serve"]))
        .await
        .unwrap();

    assert_eq!(settings.queue_server, "10.1.1.1:7500");
    assert_eq!(settings.capacity, 64);
    assert_eq!(settings.poll_timeout, Duration::from_millis(500));
    assert_eq!(settings.max_visits, None);
    assert_eq!(settings.log_format, LogFormat::Json);
    assert_eq!(settings.log_file, None);
}

#[tokio::test]
async fn test_flags_win_over_file() {
    let file = config_file(
        r#"
queue-server = "10.1.1.1:7500"
connect-attempts = 5
log-level = "warn"
"#,
    );
    let path = file.path().to_str().unwrap();

    let settings = Settings::resolve(&args(&[
        "jobqueue",
        "-c",
        path,
        "-l",
        "trace",
        "publish",
        "--server",
        "127.0.0.1:9000",
        "ping",
    ]))
    .await
    .unwrap();

    assert_eq!(settings.queue_server, "127.0.0.1:9000");
    assert_eq!(settings.connect_attempts, 5);
    assert_eq!(settings.log_level.as_deref(), Some("trace"));
}

#[tokio::test]
async fn test_log_file_flag_sets_path() {
    let settings = Settings::resolve(&args(&["jobqueue", "-f", "/tmp/queue.log", "serve"]))
        .await
        .unwrap();
    assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/queue.log")));
}

#[tokio::test]
async fn test_wrong_value_type_is_invalid() {
    let file = config_file("queue-capacity = \"big\"\n");
    let path = file.path().to_str().unwrap();

    let err = Settings::resolve(&args(&["jobqueue", "-c", path, "serve"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }), "got: {:?}", err);
}

#[tokio::test]
async fn test_zero_capacity_flag_is_invalid() {
    let err = Settings::resolve(&args(&["jobqueue", "serve", "--capacity", "0"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("--capacity"), "got: {}", err);
}
