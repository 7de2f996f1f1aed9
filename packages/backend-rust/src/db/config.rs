use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub primary_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub health_check: HealthCheckConfig,
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbConfigError> {
        let primary_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(DbConfigError::Missing {
                key: "DATABASE_URL",
            })?;

        let max_connections = env_u32("DB_MAX_CONNECTIONS", 10).max(1);
        let acquire_timeout_ms = env_u64("DB_ACQUIRE_TIMEOUT_MS", 5000);

        Ok(Self {
            primary_url,
            max_connections,
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            health_check: HealthCheckConfig::from_env(),
            run_migrations: env_bool("DB_RUN_MIGRATIONS", true),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub timeout: Duration,
}

impl HealthCheckConfig {
    fn from_env() -> Self {
        let timeout_ms = env_u64("DB_HEALTH_CHECK_TIMEOUT_MS", 3000);

        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("Missing required env var: {key}")]
    Missing { key: &'static str },
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}
