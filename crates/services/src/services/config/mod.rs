use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{
    AuthConfig, AutomationConfig, BusinessConfig, CURRENT_CONFIG_VERSION, Config, SlaConfig,
    UploadConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!("No config file found, creating one");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

/// Saves the config to the given path
pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let normalized = config.clone().normalized();
    if normalized.auth.jwt_secret.is_none() {
        return Err(ConfigError::ValidationError(
            "refusing to save a config without a JWT secret".to_string(),
        ));
    }
    let raw_config = serde_json::to_string_pretty(&normalized)?;
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}
