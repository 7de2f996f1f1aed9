pub mod config;
pub mod migrate;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::config::{DbConfig, DbConfigError, HealthCheckConfig};

/// Handle to the Postgres database. Cloned into every request through
/// [`crate::state::AppState`]; implements the store traits in
/// [`crate::store::postgres`].
#[derive(Clone)]
pub struct DatabaseProxy {
    pool: PgPool,
    health_check: HealthCheckConfig,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Arc<Self>, DbInitError> {
        let config = DbConfig::from_env()?;
        Self::connect(&config).await
    }

    pub async fn connect(config: &DbConfig) -> Result<Arc<Self>, DbInitError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.primary_url)
            .await
            .map_err(DbInitError::Sqlx)?;

        if config.run_migrations {
            migrate::run_migrations(&pool).await?;
        }

        Ok(Arc::new(Self {
            pool,
            health_check: config.health_check.clone(),
        }))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            health_check: HealthCheckConfig::default(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn health_check(&self) -> &HealthCheckConfig {
        &self.health_check
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Config(#[from] DbConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] migrate::MigrationError),
}
