//! Configuration module for papad.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::server::{default_socket_path, DEFAULT_BACKLOG, DEFAULT_IO_TIMEOUT, DEFAULT_SOCKET_MODE};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the daemon
#[derive(Parser, Debug)]
#[command(name = "papad")]
#[command(author = "papad authors")]
#[command(version = "0.1.0")]
#[command(about = "Track playback daemon", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Control socket path (defaults to /var/run/user/<uid>/papa/papad.sock)
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Listen backlog for the control socket
    #[arg(short, long)]
    pub backlog: Option<i32>,

    /// Per-client read/write timeout in milliseconds (0 = no timeout)
    #[arg(short = 't', long)]
    pub read_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daemon (default)
    Serve,
    /// Send a command to a running daemon and print the response
    Send {
        /// Command words, e.g. `play track42`
        #[arg(required = true, trailing_var_arg = true)]
        words: Vec<String>,
    },
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tracks: TracksConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control socket configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket path override
    pub socket_path: Option<PathBuf>,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Socket file mode
    #[serde(default = "default_socket_mode")]
    pub socket_mode: u32,
    /// Per-client read/write timeout in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            backlog: default_backlog(),
            socket_mode: default_socket_mode(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Track manager configuration
#[derive(Debug, Deserialize, Default)]
pub struct TracksConfig {
    /// Track ids that may be played (empty = any)
    #[serde(default)]
    pub catalog: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}

fn default_socket_mode() -> u32 {
    DEFAULT_SOCKET_MODE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_IO_TIMEOUT.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub socket_path: PathBuf,
    pub backlog: i32,
    pub socket_mode: u32,
    pub io_timeout: Option<Duration>,
    pub catalog: Vec<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let read_timeout_ms = cli
            .read_timeout_ms
            .unwrap_or(toml_config.server.read_timeout_ms);

        Config {
            command: cli.command.unwrap_or(Command::Serve),
            socket_path: cli
                .socket
                .or(toml_config.server.socket_path)
                .unwrap_or_else(default_socket_path),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            socket_mode: toml_config.server.socket_mode,
            io_timeout: (read_timeout_ms > 0).then(|| Duration::from_millis(read_timeout_ms)),
            catalog: toml_config.tracks.catalog,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.socket_path, None);
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.server.socket_mode, 0o666);
        assert_eq!(config.server.read_timeout_ms, 5000);
        assert!(config.tracks.catalog.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            socket_path = "/tmp/papa/papad.sock"
            backlog = 16
            socket_mode = 384
            read_timeout_ms = 0

            [tracks]
            catalog = ["intro", "loop-a"]

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.server.socket_path,
            Some(PathBuf::from("/tmp/papa/papad.sock"))
        );
        assert_eq!(config.server.backlog, 16);
        assert_eq!(config.server.socket_mode, 0o600);
        assert_eq!(config.server.read_timeout_ms, 0);
        assert_eq!(config.tracks.catalog, vec!["intro", "loop-a"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let cli = CliArgs::parse_from([
            "papad",
            "--socket",
            "/tmp/cli.sock",
            "--backlog",
            "2",
            "--log-level",
            "trace",
        ]);
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            socket_path = "/tmp/file.sock"
            backlog = 16
            "#,
        )
        .unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/cli.sock"));
        assert_eq!(config.backlog, 2);
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.command, Command::Serve);
        assert_eq!(config.io_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let cli = CliArgs::parse_from(["papad", "-t", "0"]);
        let config = Config::merge(cli, TomlConfig::default());
        assert_eq!(config.io_timeout, None);
        assert_eq!(config.socket_path, default_socket_path());
    }

    #[test]
    fn test_send_subcommand() {
        let cli = CliArgs::parse_from(["papad", "send", "play", "track42"]);
        let config = Config::merge(cli, TomlConfig::default());
        assert_eq!(
            config.command,
            Command::Send {
                words: vec!["play".to_string(), "track42".to_string()]
            }
        );
    }

    #[test]
    fn test_missing_config_file() {
        let cli = CliArgs::parse_from(["papad", "--config", "/nonexistent/papad.toml"]);
        assert!(matches!(
            Config::from_cli(cli),
            Err(ConfigError::FileRead(_, _))
        ));
    }
}
