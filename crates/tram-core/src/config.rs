//! Configuration module
//!
//! Settings are read once from the environment (with `.env` support) and then
//! passed explicitly to every component that needs them.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const ML_ACCEPT_THRESHOLD: u32 = 4;
const ML_CONFIDENCE_THRESHOLD: u32 = 95;
const HTTP_CONCURRENCY_LIMIT: usize = 1_000;

/// Server and database settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Requests served at once; further requests wait for a slot.
    pub http_concurrency_limit: usize,
    pub environment: String,
    /// Emit logs as JSON lines instead of the compact console format.
    pub json_logs: bool,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub local_storage_path: PathBuf,
    pub max_upload_size_bytes: usize,
    /// Minimum number of accepted sentences before a technique is trained on.
    pub ml_accept_threshold: u32,
    /// Confidence (percent) at or above which a predicted mapping is kept.
    pub ml_confidence_threshold: u32,
    /// JSON file where the ML pipeline publishes its model metadata.
    pub ml_model_metadata_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            http_concurrency_limit: env::var("HTTP_CONCURRENCY_LIMIT")
                .unwrap_or_else(|_| HTTP_CONCURRENCY_LIMIT.to_string())
                .parse()
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
            environment,
            json_logs: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()?;

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        Ok(Self {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/media".to_string())
                .into(),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            ml_accept_threshold: env::var("ML_ACCEPT_THRESHOLD")
                .unwrap_or_else(|_| ML_ACCEPT_THRESHOLD.to_string())
                .parse()
                .unwrap_or(ML_ACCEPT_THRESHOLD),
            ml_confidence_threshold: env::var("ML_CONFIDENCE_THRESHOLD")
                .unwrap_or_else(|_| ML_CONFIDENCE_THRESHOLD.to_string())
                .parse()
                .unwrap_or(ML_CONFIDENCE_THRESHOLD),
            ml_model_metadata_path: env::var("ML_MODEL_METADATA_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Configuration for a local development setup rooted at `storage_path`.
    pub fn local(database_url: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            base: BaseConfig {
                server_port: 8000,
                cors_origins: vec!["*".to_string()],
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
                environment: "development".to_string(),
                json_logs: false,
            },
            database_url: database_url.into(),
            storage_backend: StorageBackend::Local,
            local_storage_path: storage_path.into(),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            ml_accept_threshold: ML_ACCEPT_THRESHOLD,
            ml_confidence_threshold: ML_CONFIDENCE_THRESHOLD,
            ml_model_metadata_path: None,
        }
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if self.base.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be greater than 0"));
        }

        if self.ml_confidence_threshold > 100 {
            return Err(anyhow::anyhow!(
                "ML_CONFIDENCE_THRESHOLD must be between 0 and 100"
            ));
        }

        match self.storage_backend {
            StorageBackend::Local => {
                if self.local_storage_path.as_os_str().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    // Convenience getters
    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.base.db_timeout_seconds
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.base.http_concurrency_limit
    }

    pub fn json_logs(&self) -> bool {
        self.base.json_logs
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config_is_valid() {
        let config = Config::local("postgresql://localhost/tram", "/tmp/tram");
        assert!(config.validate().is_ok());
        assert!(!config.is_production());
        assert_eq!(config.ml_accept_threshold, 4);
        assert_eq!(config.ml_confidence_threshold, 95);
        assert_eq!(config.http_concurrency_limit(), 1_000);
        assert!(!config.json_logs());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency_limit() {
        let mut config = Config::local("postgres://localhost/tram", "/tmp/tram");
        config.base.http_concurrency_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_postgres_url() {
        let config = Config::local("mysql://localhost/tram", "/tmp/tram");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_confidence_threshold_above_100() {
        let mut config = Config::local("postgres://localhost/tram", "/tmp/tram");
        config.ml_confidence_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut config = Config::local("postgres://localhost/tram", "/tmp/tram");
        config.base.environment = "PROD".to_string();
        assert!(config.is_production());
    }
}
