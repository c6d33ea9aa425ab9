//! TOML configuration file loading and settings resolution
//!
//! Settings come from three layers: built-in defaults, then the
//! configuration file, then command line flags.
//!
//! ```toml
//! queue-server = "127.0.0.1:7500"
//! queue-capacity = 1024
//! poll-timeout-ms = 1000
//! max-visits = 10
//! log-level = "info"
//! log-format = "text"
//! log-file = "none"
//! color = true
//! ```

use super::args::{Args, Command};
use crate::core::logging::LogFormat;
use crate::queue::{DEFAULT_CAPACITY, DEFAULT_MAX_VISITS, DEFAULT_POLL_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_QUEUE_SERVER: &str = "127.0.0.1:7500";
pub const DEFAULT_CONNECT_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("Error reading configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Fully resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub queue_server: String,
    pub capacity: usize,
    pub poll_timeout: Duration,
    /// `None` retries failing messages forever
    pub max_visits: Option<u32>,
    pub connect_attempts: usize,
    pub log_level: Option<String>,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    /// `None` decides by terminal detection
    pub color: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue_server: DEFAULT_QUEUE_SERVER.to_string(),
            capacity: DEFAULT_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_visits: Some(DEFAULT_MAX_VISITS),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            log_level: None,
            log_format: LogFormat::Text,
            log_file: None,
            color: None,
        }
    }
}

/// `jobqueue/jobqueue.toml` in the user's configuration directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jobqueue").join("jobqueue.toml"))
}

impl Settings {
    /// Resolve settings for `args`, reading the configuration file if any
    pub async fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();

        let config_path = match &args.config_file {
            Some(path) if !path.exists() => return Err(ConfigError::Missing(path.clone())),
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(path) = config_path {
            let config = load_config_file(&path).await?;
            settings.apply_toml_values(&config)?;
        }

        settings.apply_args(args)?;
        Ok(settings)
    }

    /// Apply TOML configuration values on top of the current settings
    pub fn apply_toml_values(&mut self, config: &toml::Table) -> Result<(), ConfigError> {
        if let Some(server) = config.get("queue-server") {
            self.queue_server = expect_str("queue-server", server)?.to_string();
        }
        if let Some(capacity) = config.get("queue-capacity") {
            self.capacity = expect_positive("queue-capacity", capacity)? as usize;
        }
        if let Some(timeout) = config.get("poll-timeout-ms") {
            self.poll_timeout = Duration::from_millis(expect_positive("poll-timeout-ms", timeout)?);
        }
        if let Some(max_visits) = config.get("max-visits") {
            let max_visits = expect_non_negative("max-visits", max_visits)?;
            self.max_visits = visits_limit(max_visits as u32);
        }
        if let Some(attempts) = config.get("connect-attempts") {
            self.connect_attempts = expect_positive("connect-attempts", attempts)? as usize;
        }
        if let Some(level) = config.get("log-level") {
            self.log_level = Some(expect_str("log-level", level)?.to_string());
        }
        if let Some(format) = config.get("log-format") {
            self.log_format = parse_log_format("log-format", expect_str("log-format", format)?)?;
        }
        if let Some(file) = config.get("log-file") {
            self.log_file = log_file_path(Path::new(expect_str("log-file", file)?));
        }
        if let Some(color) = config.get("color") {
            self.color = Some(color.as_bool().ok_or_else(|| invalid("color", "expected a boolean"))?);
        }
        Ok(())
    }

    /// Apply command line flags; they win over file values
    pub fn apply_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        if let Some(level) = &args.log_level {
            self.log_level = Some(level.clone());
        }
        if let Some(format) = &args.log_format {
            self.log_format = parse_log_format("--log-format", format)?;
        }
        if let Some(file) = &args.log_file {
            self.log_file = log_file_path(file);
        }
        if let Some(color) = args.color {
            self.color = Some(color);
        }

        match &args.command {
            Command::Serve(serve) => {
                if let Some(bind) = &serve.bind {
                    self.queue_server = bind.clone();
                }
                if let Some(capacity) = serve.capacity {
                    if capacity == 0 {
                        return Err(invalid("--capacity", "must be greater than 0"));
                    }
                    self.capacity = capacity;
                }
                if let Some(ms) = serve.poll_timeout_ms {
                    if ms == 0 {
                        return Err(invalid("--poll-timeout-ms", "must be greater than 0"));
                    }
                    self.poll_timeout = Duration::from_millis(ms);
                }
                if let Some(max_visits) = serve.max_visits {
                    self.max_visits = visits_limit(max_visits);
                }
            }
            Command::Publish(publish) => {
                if let Some(server) = &publish.server {
                    self.queue_server = server.clone();
                }
                if let Some(retries) = publish.retries {
                    self.connect_attempts = retries.max(1);
                }
            }
        }
        Ok(())
    }
}

async fn load_config_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str::<toml::Table>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn expect_str<'a>(key: &str, value: &'a toml::Value) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| invalid(key, "expected a string"))
}

fn expect_non_negative(key: &str, value: &toml::Value) -> Result<u64, ConfigError> {
    match value.as_integer() {
        Some(n) if n >= 0 && n <= u32::MAX as i64 => Ok(n as u64),
        Some(_) => Err(invalid(key, "out of range")),
        None => Err(invalid(key, "expected an integer")),
    }
}

fn expect_positive(key: &str, value: &toml::Value) -> Result<u64, ConfigError> {
    match expect_non_negative(key, value)? {
        0 => Err(invalid(key, "must be greater than 0")),
        n => Ok(n),
    }
}

fn parse_log_format(key: &str, value: &str) -> Result<LogFormat, ConfigError> {
    value
        .parse::<LogFormat>()
        .map_err(|message| invalid(key, &message))
}

// "none" and "-" disable file logging
fn log_file_path(value: &Path) -> Option<PathBuf> {
    match value.to_str() {
        Some(s) if s.eq_ignore_ascii_case("none") || s == "-" => None,
        _ => Some(value.to_path_buf()),
    }
}

// Zero means retry forever
fn visits_limit(max_visits: u32) -> Option<u32> {
    (max_visits > 0).then_some(max_visits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn table(text: &str) -> toml::Table {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.queue_server, DEFAULT_QUEUE_SERVER);
        assert_eq!(settings.capacity, DEFAULT_CAPACITY);
        assert_eq!(settings.max_visits, Some(DEFAULT_MAX_VISITS));
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn test_apply_toml_values() {
        let mut settings = Settings::default();
        settings
            .apply_toml_values(&table(
                r#"
                queue-server = "0.0.0.0:9000"
                queue-capacity = 16
                poll-timeout-ms = 250
                max-visits = 0
                log-level = "debug"
                log-format = "json"
                log-file = "none"
                color = false
                "#,
            ))
            .unwrap();

        assert_eq!(settings.queue_server, "0.0.0.0:9000");
        assert_eq!(settings.capacity, 16);
        assert_eq!(settings.poll_timeout, Duration::from_millis(250));
        assert_eq!(settings.max_visits, None);
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.log_file, None);
        assert_eq!(settings.color, Some(false));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_toml_values(&table("queue-capacity = 0"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "queue-capacity"));

        let err = settings
            .apply_toml_values(&table("queue-server = 7500"))
            .unwrap_err();
        assert!(err.to_string().contains("queue-server"));

        let err = settings
            .apply_toml_values(&table(r#"log-format = "xml""#))
            .unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }

    #[tokio::test]
    async fn test_cli_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "queue-server = \"10.0.0.5:7500\"\nmax-visits = 4\nlog-level = \"warn\""
        )
        .unwrap();

        let args = Args::try_parse_from([
            "jobqueue",
            "--config-file",
            file.path().to_str().unwrap(),
            "--log-level",
            "trace",
            "serve",
            "--bind",
            "127.0.0.1:0",
        ])
        .unwrap();

        let settings = Settings::resolve(&args).await.unwrap();
        assert_eq!(settings.queue_server, "127.0.0.1:0");
        assert_eq!(settings.max_visits, Some(4));
        assert_eq!(settings.log_level.as_deref(), Some("trace"));
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let args = Args::try_parse_from([
            "jobqueue",
            "-c",
            missing.to_str().unwrap(),
            "publish",
            "start-app",
        ])
        .unwrap();

        let err = Settings::resolve(&args).await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[tokio::test]
    async fn test_unparseable_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queue-server = ").unwrap();

        let args = Args::try_parse_from([
            "jobqueue",
            "-c",
            file.path().to_str().unwrap(),
            "publish",
            "start-app",
        ])
        .unwrap();

        let err = Settings::resolve(&args).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_publish_retries_override() {
        let args =
            Args::try_parse_from(["jobqueue", "publish", "--retries", "0", "ping"]).unwrap();
        let mut settings = Settings::default();
        settings.apply_args(&args).unwrap();
        assert_eq!(settings.connect_attempts, 1);
    }
}
