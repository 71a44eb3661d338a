//! Process configuration loaded once at startup
//!
//! Configuration is read from environment variables:
//! - `BIND_HOST` / `PORT`: listener address (default: 0.0.0.0:3200); `BIND_HOST` must be
//!   an IP address, hostnames are rejected
//! - `APP_ENV`: deployment environment reported by `/health` (default: development)
//! - `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`: MySQL connection
//! - `DB_CONNECT_ATTEMPTS`, `DB_RETRY_DELAY_MS`: bootstrap retry policy
//!
//! Empty values are treated as unset. Malformed numbers are rejected rather
//! than silently replaced by the default.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use sqlx::mysql::MySqlConnectOptions;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3200;

/// Default database name
pub const DEFAULT_DB_NAME: &str = "bookshelf";

/// Per-attempt connect timeout, also bounds the health probe's ping.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub retry: RetryPolicy,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:3200)
    pub bind_addr: SocketAddr,

    /// Environment name reported by the liveness probe
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            environment: "development".to_string(),
        }
    }
}

/// MySQL connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: DEFAULT_DB_NAME.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl DbConfig {
    /// sqlx connect options for this configuration
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Bounded fixed-delay retry policy for the connection bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connection attempts before giving up (at least 1)
    pub max_attempts: u32,

    /// Delay between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    /// Worst-case time spent waiting between attempts before giving up.
    pub fn degraded_window(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup (for testing)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let server_defaults = ServerConfig::default();
        let db_defaults = DbConfig::default();
        let retry_defaults = RetryPolicy::default();

        let host = env.parse("BIND_HOST", server_defaults.bind_addr.ip())?;
        let port = env.parse("PORT", DEFAULT_PORT)?;

        let server = ServerConfig {
            bind_addr: SocketAddr::new(host, port),
            environment: env.string("APP_ENV", &server_defaults.environment),
        };

        let db = DbConfig {
            host: env.string("DB_HOST", &db_defaults.host),
            port: env.parse("DB_PORT", db_defaults.port)?,
            user: env.string("DB_USER", &db_defaults.user),
            password: env.string("DB_PASSWORD", &db_defaults.password),
            database: env.string("DB_NAME", &db_defaults.database),
            connect_timeout: CONNECT_TIMEOUT,
        };

        let max_attempts: u32 = env.parse("DB_CONNECT_ATTEMPTS", retry_defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_CONNECT_ATTEMPTS",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        let delay_ms: u64 =
            env.parse("DB_RETRY_DELAY_MS", retry_defaults.delay.as_millis() as u64)?;

        Ok(Self {
            server,
            db,
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(delay_ms),
            },
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|value| !value.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(value) => match value.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => Err(ConfigError::Invalid {
                    var,
                    reason: e.to_string(),
                    value,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_empty() {
        let config = load(&[]).unwrap();

        assert_eq!(config.server.bind_addr.port(), 3200);
        assert!(config.server.bind_addr.ip().is_unspecified());
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.db, DbConfig::default());
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, 3306);
        assert_eq!(config.db.user, "root");
        assert_eq!(config.db.password, "");
        assert_eq!(config.db.database, "bookshelf");
        assert_eq!(config.db.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(5000));
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "3307"),
            ("DB_USER", "reader"),
            ("DB_PASSWORD", "hunter2"),
            ("DB_NAME", "test_db"),
            ("DB_CONNECT_ATTEMPTS", "3"),
            ("DB_RETRY_DELAY_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.server.bind_addr.port(), 8080);
        assert_eq!(config.server.environment, "production");
        assert_eq!(config.db.host, "db.internal");
        assert_eq!(config.db.port, 3307);
        assert_eq!(config.db.user, "reader");
        assert_eq!(config.db.password, "hunter2");
        assert_eq!(config.db.database, "test_db");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_millis(250));
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = load(&[("DB_HOST", ""), ("PORT", "")]).unwrap();
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.server.bind_addr.port(), 3200);
    }

    #[test]
    fn bind_host_overrides_listen_address() {
        let config = load(&[("BIND_HOST", "127.0.0.1")]).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:3200");
    }

    #[test]
    fn shell_host_variable_is_ignored() {
        // many shells export HOST as the machine hostname
        let config = load(&[("HOST", "my-laptop")]).unwrap();
        assert!(config.server.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn hostname_in_bind_host_is_rejected() {
        let err = load(&[("BIND_HOST", "my-laptop")]).unwrap_err();
        assert!(err.to_string().contains("BIND_HOST"));
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn out_of_range_db_port_is_rejected() {
        let err = load(&[("DB_PORT", "70000")]).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(load(&[("DB_CONNECT_ATTEMPTS", "0")]).is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = load(&[("DB_PASSWORD", "hunter2")]).unwrap();
        let debug = format!("{:?}", config.db);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn degraded_window_counts_delays_between_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.degraded_window(), Duration::from_secs(20));
    }
}
