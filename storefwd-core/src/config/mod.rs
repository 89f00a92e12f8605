//! Configuration management for the object store
//!
//! Environment- and file-based configuration with defaults and validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Connection settings for the remote key-value store
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Password sent on connect (optional)
    pub password: Option<String>,

    /// Dial timeout for new connections
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// How long an idle pooled connection is kept
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Maximum idle connections kept in the pool
    pub max_idle: u32,

    /// Page size for collaborators that page through results
    pub batch_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            connect_timeout: Duration::from_millis(5000),
            idle_timeout: Duration::from_millis(5000),
            max_idle: 3,
            batch_size: 1337,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_idle", &self.max_idle)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl DatabaseConfig {
    /// `host:port` of the server
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate connection settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::ValidationFailed("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::ValidationFailed(
                "port must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_idle == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_idle must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn parse_duration_var(name: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(raw) => humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: STOREFWD_<SECTION>_<KEY>
    /// Example: STOREFWD_DB_HOST=redis.internal
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Database config
        if let Ok(host) = env::var("STOREFWD_DB_HOST") {
            config.database.host = host;
        }
        if let Some(port) = parse_var("STOREFWD_DB_PORT")? {
            config.database.port = port;
        }
        if let Ok(password) = env::var("STOREFWD_DB_PASSWORD") {
            config.database.password = Some(password);
        }
        if let Some(timeout) = parse_duration_var("STOREFWD_DB_CONNECT_TIMEOUT")? {
            config.database.connect_timeout = timeout;
        }
        if let Some(timeout) = parse_duration_var("STOREFWD_DB_IDLE_TIMEOUT")? {
            config.database.idle_timeout = timeout;
        }
        if let Some(max_idle) = parse_var("STOREFWD_DB_MAX_IDLE")? {
            config.database.max_idle = max_idle;
        }
        if let Some(batch_size) = parse_var("STOREFWD_DB_BATCH_SIZE")? {
            config.database.batch_size = batch_size;
        }

        // Logging config
        if let Ok(level) = env::var("STOREFWD_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = parse_var("STOREFWD_LOG_JSON")? {
            config.logging.json_format = json;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.address(), "localhost:6379");
    }

    #[test]
    fn test_database_validation() {
        let mut config = Config::default();
        config.database.host.clear();
        assert!(config.validate().is_err());

        config = Config::default();
        config.database.port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.database.max_idle = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.database.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_redacted() {
        let config = DatabaseConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };

        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
host = "redis.internal"
port = 6380
password = "secret"
connect_timeout = "250ms"
idle_timeout = "30s"
max_idle = 5
batch_size = 50

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.database.host, "redis.internal");
        assert_eq!(config.database.port, 6380);
        assert_eq!(config.database.password.as_deref(), Some("secret"));
        assert_eq!(config.database.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.database.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.database.max_idle, 5);
        assert_eq!(config.database.batch_size, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\nport = 0").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/storefwd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError(_)));
    }
}
