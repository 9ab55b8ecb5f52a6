//! Postgres pool and schema migrations

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tram_core::Config;

/// Workspace `migrations/`, compiled into the binary.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
}

/// Open the pool, then bring the schema up to date before any request is
/// served.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = pool_options(config)
        .connect(config.database_url())
        .await
        .context("Failed to connect to Postgres")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply schema migrations")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        migrations = MIGRATOR.iter().count(),
        "Postgres ready"
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_follows_config() {
        let mut config = Config::local("postgres://localhost/tram", std::env::temp_dir());
        config.base.db_max_connections = 7;
        config.base.db_timeout_seconds = 12;

        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_migrations_are_embedded() {
        assert!(MIGRATOR.iter().any(|m| m.description == "init"));
    }
}
