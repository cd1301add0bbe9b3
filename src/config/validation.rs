use crate::config::types::{Config, CrawlerConfig, LlmConfig, NetworkConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_network_config(&config.network)?;
    validate_storage_config(&config.storage)?;
    validate_llm_config(&config.llm)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.default_max_depth > 10 {
        return Err(ConfigError::Validation(format!(
            "default_max_depth must be <= 10, got {}",
            config.default_max_depth
        )));
    }

    Ok(())
}

fn validate_network_config(config: &NetworkConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_interval_ms must be >= 100ms, got {}ms",
            config.request_interval_ms
        )));
    }

    if config.fetch_timeout_secs == 0 || config.download_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch and download timeouts must be > 0".to_string(),
        ));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("index_path", &config.index_path),
        ("history_path", &config.history_path),
        ("datasets_dir", &config.datasets_dir),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.index_path == config.history_path {
        return Err(ConfigError::Validation(
            "index_path and history_path must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm_config(config: &LlmConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid llm base_url: {}", e)))?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env must list at least one variable".to_string(),
        ));
    }

    if !(0.0_f32..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "llm max_retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}
