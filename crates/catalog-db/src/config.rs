//! Database configuration.
//!
//! Built in code with the builder methods, or loaded from `CATALOG_DB_*`
//! environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path used for in-memory databases.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Database configuration.
///
/// ## Example
/// ```rust
/// use catalog_db::DbConfig;
///
/// let config = DbConfig::new("/path/to/catalog.db")
///     .max_connections(5)
///     .min_connections(1);
/// assert_eq!(config.max_connections, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Each open unit of work holds one.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Time allowed for acquiring a connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Upper bound on any single store command issued by a unit of work.
    /// Default: 30 seconds
    pub command_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            command_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The pool holds a single connection, so only one unit of work can be
    /// open at a time. Drop one before asking for the next.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            command_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// True when the configuration targets an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable                          | Default       |
    /// |-----------------------------------|---------------|
    /// | `CATALOG_DB_PATH`                 | `catalog.db`  |
    /// | `CATALOG_DB_MAX_CONNECTIONS`      | `5`           |
    /// | `CATALOG_DB_MIN_CONNECTIONS`      | `1`           |
    /// | `CATALOG_DB_CONNECT_TIMEOUT_SECS` | `30`          |
    /// | `CATALOG_DB_COMMAND_TIMEOUT_SECS` | `30`          |
    /// | `CATALOG_DB_RUN_MIGRATIONS`       | `true`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::new(
            lookup("CATALOG_DB_PATH").unwrap_or_else(|| "catalog.db".to_string()),
        );

        let config = DbConfig {
            max_connections: parse_or(&lookup, "CATALOG_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&lookup, "CATALOG_DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CATALOG_DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            command_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CATALOG_DB_COMMAND_TIMEOUT_SECS",
                defaults.command_timeout.as_secs(),
            )?),
            run_migrations: parse_or(&lookup, "CATALOG_DB_RUN_MIGRATIONS", defaults.run_migrations)?,
            ..defaults
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("CATALOG_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.min_connections > config.max_connections {
            return Err(ConfigError::InvalidValue("CATALOG_DB_MIN_CONNECTIONS".to_string()));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .command_timeout(Duration::from_secs(3));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.command_timeout, Duration::from_secs(3));
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_in_memory_uses_single_connection() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = DbConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, DbConfig::new("catalog.db"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = DbConfig::from_lookup(lookup_from(&[
            ("CATALOG_DB_PATH", "/var/lib/catalog.db"),
            ("CATALOG_DB_MAX_CONNECTIONS", "8"),
            ("CATALOG_DB_COMMAND_TIMEOUT_SECS", "2"),
            ("CATALOG_DB_RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/catalog.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.command_timeout, Duration::from_secs(2));
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = DbConfig::from_lookup(lookup_from(&[("CATALOG_DB_MAX_CONNECTIONS", "lots")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for CATALOG_DB_MAX_CONNECTIONS");

        let err = DbConfig::from_lookup(lookup_from(&[
            ("CATALOG_DB_MAX_CONNECTIONS", "2"),
            ("CATALOG_DB_MIN_CONNECTIONS", "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var) if var == "CATALOG_DB_MIN_CONNECTIONS"));
    }
}
