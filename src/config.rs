//! Environment configuration with validation

use std::{env, time::Duration};

use crate::rate_limit::RateLimiterConfig;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Upper bound on graceful shutdown, in seconds
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub idle_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub cleanup_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                read_timeout: 15,
                write_timeout: 15,
                idle_timeout: 60,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: 60,
                cleanup_interval: 300,
            },
            shutdown_timeout: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unset or empty keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let int = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                None => Ok(default),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(value) => Ok(value),
                    Err(_) => Err(ConfigError::InvalidNumber { field: key, value: raw }),
                },
            }
        };

        let port = int("SERVER_PORT", defaults.server.port.into())?;
        let requests_per_minute = int(
            "RATE_LIMIT_REQUESTS_PER_MINUTE",
            defaults.rate_limit.requests_per_minute.into(),
        )?;

        validate_range("SERVER_PORT", port, 1, 65535)?;
        validate_range("RATE_LIMIT_REQUESTS_PER_MINUTE", requests_per_minute, 1, 10000)?;

        let config = Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or(defaults.server.host),
                port: port as u16,
                read_timeout: int("SERVER_READ_TIMEOUT", defaults.server.read_timeout)?,
                write_timeout: int("SERVER_WRITE_TIMEOUT", defaults.server.write_timeout)?,
                idle_timeout: int("SERVER_IDLE_TIMEOUT", defaults.server.idle_timeout)?,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: requests_per_minute as u32,
                cleanup_interval: int(
                    "RATE_LIMIT_CLEANUP_INTERVAL",
                    defaults.rate_limit.cleanup_interval,
                )?,
            },
            shutdown_timeout: int("SHUTDOWN_TIMEOUT", defaults.shutdown_timeout)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range("SERVER_PORT", self.server.port.into(), 1, 65535)?;
        validate_range("SERVER_READ_TIMEOUT", self.server.read_timeout, 1, 300)?;
        validate_range("SERVER_WRITE_TIMEOUT", self.server.write_timeout, 1, 300)?;
        validate_range("SERVER_IDLE_TIMEOUT", self.server.idle_timeout, 1, 600)?;
        validate_range(
            "RATE_LIMIT_REQUESTS_PER_MINUTE",
            self.rate_limit.requests_per_minute.into(),
            1,
            10000,
        )?;
        validate_range(
            "RATE_LIMIT_CLEANUP_INTERVAL",
            self.rate_limit.cleanup_interval,
            60,
            3600,
        )?;
        validate_range("SHUTDOWN_TIMEOUT", self.shutdown_timeout, 1, 300)?;

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout)
    }

    /// Per-request deadline for handlers
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.write_timeout)
    }

    /// TCP keepalive probe interval. Idle HTTP connections are not closed on a timer.
    pub fn tcp_keepalive(&self) -> Duration {
        Duration::from_secs(self.server.idle_timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Limiter settings. The window is fixed at one minute.
    pub fn rate_limiter(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            requests_per_window: self.rate_limit.requests_per_minute,
            window: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(self.rate_limit.cleanup_interval),
        }
    }
}

fn validate_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::OutOfRange {
            field,
            message: format!("must be at least {}, got: {}", min, value),
        });
    }

    if value > max {
        return Err(ConfigError::OutOfRange {
            field,
            message: format!("must not exceed {}, got: {}", max, value),
        });
    }

    Ok(())
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error for field '{field}': failed to parse {value:?} as integer")]
    InvalidNumber { field: &'static str, value: String },

    #[error("configuration error for field '{field}': {message}")]
    OutOfRange { field: &'static str, message: String },
}

impl ConfigError {
    /// Variable the error is about
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::InvalidNumber { field, .. } | ConfigError::OutOfRange { field, .. } => field,
        }
    }
}
