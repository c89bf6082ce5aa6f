use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "TAGMILL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tagmill.toml";
const ENV_PREFIX: &str = "TAGMILL";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Load secrets from environment variables into config.
/// Secrets are never stored in TOML files, only in environment.
fn load_secrets(config: &mut Config) {
    if let Ok(api_key) = env::var("TAGMILL_INFERENCE_API_KEY") {
        config.inference.api_key = Some(api_key);
    }

    if let Ok(access_key) = env::var("AWS_ACCESS_KEY_ID") {
        config.storage.access_key = Some(access_key);
    }
    if let Ok(secret_key) = env::var("AWS_SECRET_ACCESS_KEY") {
        config.storage.secret_key = Some(secret_key);
    }
}

/// Load configuration from a specific path.
/// Useful for testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // TAGMILL__DISPATCH__THROTTLE_MS -> dispatch.throttle_ms
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.dispatch.throttle_ms, 2000);
    }

    #[test]
    fn load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[server.api]
max_asset_bytes = "10MB"

[dispatch]
throttle_ms = 500
rate_limit_backoff_ms = 1500
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.api.max_asset_bytes.as_u64(), 10 * 1024 * 1024);
        assert_eq!(config.dispatch.throttle_ms, 500);
        assert_eq!(config.dispatch.rate_limit_backoff_ms, 1500);
    }

    #[test]
    fn full_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
history_path = "data/history"

[dispatch]
throttle_ms = 2000
rate_limit_backoff_ms = 5000
cost_per_variant = 2

[inference]
endpoint = "https://inference.example/v1/generate"
request_timeout_secs = 60

[storage]
provider = "s3"
bucket = "tagmill-prod"
public_base_url = "https://cdn.example"
region = "eu-west-1"

[credits]
starting_balance = 500
unlimited = false

[retention]
history_ttl_days = 30
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();

        assert_eq!(config.dispatch.cost_per_variant, 2);
        assert_eq!(config.inference.endpoint, "https://inference.example/v1/generate");
        assert_eq!(config.inference.request_timeout_secs, 60);
        assert_eq!(config.storage.bucket, "tagmill-prod");
        assert_eq!(config.storage.public_base_url, "https://cdn.example");
        assert_eq!(config.credits.starting_balance, 500);
        assert_eq!(config.retention.history_ttl_days, 30);
    }
}
