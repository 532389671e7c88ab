//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Where the service keeps its records.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local libSQL file, created on first use.
    Local { path: PathBuf },
    /// Remote libSQL server (sqld / Turso).
    Remote { url: String, auth_token: SecretString },
    /// Throwaway in-memory database.
    Memory,
}

/// Bounds on the live wizard sessions held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Most sessions kept at once; the least recently used goes first.
    pub max_sessions: usize,
    /// Sessions untouched for this long are dropped.
    pub idle_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Storage backend selection.
    pub storage: StorageConfig,
    /// Allow cross-origin requests from any origin (browser clients served elsewhere).
    pub cors_any_origin: bool,
    /// Session eviction bounds.
    pub sessions: SessionLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            storage: StorageConfig::Local {
                path: PathBuf::from("./data/onboarding.db"),
            },
            cors_any_origin: true,
            sessions: SessionLimits::default(),
        }
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

impl ServiceConfig {
    /// Build config from environment variables.
    ///
    /// `ONBOARDING_DB_URL` selects the remote backend and then requires
    /// `ONBOARDING_DB_TOKEN`. `ONBOARDING_DB_PATH=:memory:` selects the
    /// in-memory backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("ONBOARDING_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "ONBOARDING_PORT".to_string(),
                message: e.to_string(),
            })?,
            None => defaults.port,
        };

        let storage = match lookup("ONBOARDING_DB_URL").filter(|s| !s.trim().is_empty()) {
            Some(url) => {
                let token = lookup("ONBOARDING_DB_TOKEN").ok_or_else(|| {
                    ConfigError::MissingRequired {
                        key: "ONBOARDING_DB_TOKEN".to_string(),
                        hint: "A remote database URL needs an auth token".to_string(),
                    }
                })?;
                StorageConfig::Remote {
                    url,
                    auth_token: SecretString::from(token),
                }
            }
            None => match lookup("ONBOARDING_DB_PATH") {
                Some(path) if path == ":memory:" => StorageConfig::Memory,
                Some(path) => StorageConfig::Local {
                    path: PathBuf::from(path),
                },
                None => defaults.storage,
            },
        };

        let cors_any_origin = match lookup("ONBOARDING_CORS_ANY") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "ONBOARDING_CORS_ANY".to_string(),
                        message: format!("expected a boolean, got {other:?}"),
                    });
                }
            },
            None => defaults.cors_any_origin,
        };

        let max_sessions = match lookup("ONBOARDING_MAX_SESSIONS") {
            Some(raw) => parse_positive("ONBOARDING_MAX_SESSIONS", &raw)? as usize,
            None => defaults.sessions.max_sessions,
        };
        let idle_timeout = match lookup("ONBOARDING_SESSION_IDLE_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("ONBOARDING_SESSION_IDLE_SECS", &raw)?),
            None => defaults.sessions.idle_timeout,
        };

        Ok(Self {
            port,
            storage,
            cors_any_origin,
            sessions: SessionLimits {
                max_sessions,
                idle_timeout,
            },
        })
    }
}
