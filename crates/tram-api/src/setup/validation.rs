//! Startup configuration checks

use anyhow::Result;
use tram_core::Config;

/// Fail fast on settings that would only surface as errors under load.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.db_max_connections() == 0 {
        return Err(anyhow::anyhow!("Database max connections cannot be 0"));
    }

    if config.db_timeout_seconds() == 0 {
        return Err(anyhow::anyhow!("Database timeout cannot be 0"));
    }

    if config.is_production() && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Set specific allowed origins via the CORS_ORIGINS environment variable."
        ));
    }

    if config.ml_model_metadata_path.is_none() {
        tracing::warn!("ML_MODEL_METADATA_PATH not set - no model metadata will be listed");
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config_passes() {
        let dir = std::env::temp_dir();
        let config = Config::local("postgres://localhost/tram", dir);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut config = Config::local("postgres://localhost/tram", std::env::temp_dir());
        config.base.db_max_connections = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut config = Config::local("postgres://localhost/tram", std::env::temp_dir());
        config.base.environment = "production".to_string();
        config.base.cors_origins = vec!["*".to_string()];
        assert!(validate_config(&config).is_err());
    }
}
