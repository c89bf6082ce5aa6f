use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub credits: CreditSettings,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_asset_bytes")]
    pub max_asset_bytes: ByteSize,
    #[serde(default = "default_max_variants_per_item")]
    pub max_variants_per_item: usize,
    #[serde(default = "default_max_file_name_bytes")]
    pub max_file_name_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            history_path: default_history_path(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_asset_bytes: default_max_asset_bytes(),
            max_variants_per_item: default_max_variants_per_item(),
            max_file_name_bytes: default_max_file_name_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/history")
}

fn default_max_asset_bytes() -> ByteSize {
    ByteSize(25 * 1024 * 1024) // 25 MB
}

fn default_max_variants_per_item() -> usize {
    8
}

fn default_max_file_name_bytes() -> usize {
    255
}

/// Dispatch loop timing and credit cost
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchSettings {
    /// Fixed delay between consecutive inference requests
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Additional delay after a 429 response
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    #[serde(default = "default_cost_per_variant")]
    pub cost_per_variant: i64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            cost_per_variant: default_cost_per_variant(),
        }
    }
}

impl DispatchSettings {
    pub fn to_dispatch_config(&self) -> crate::session::DispatchConfig {
        crate::session::DispatchConfig {
            throttle: Duration::from_millis(self.throttle_ms),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
            cost_per_variant: self.cost_per_variant,
        }
    }
}

fn default_throttle_ms() -> u64 {
    2000
}

fn default_rate_limit_backoff_ms() -> u64 {
    5000
}

fn default_cost_per_variant() -> i64 {
    1
}

/// Inference service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceSettings {
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bearer token (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key: None,
        }
    }
}

impl InferenceSettings {
    pub fn to_inference_config(&self) -> crate::inference::InferenceConfig {
        crate::inference::InferenceConfig {
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            api_key: self.api_key.clone(),
        }
    }
}

fn default_inference_endpoint() -> String {
    "http://localhost:9400/v1/generate".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    #[default]
    Memory,
}

/// Asset storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Base of the public URLs minted for uploaded assets
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// S3 credentials (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Memory,
            bucket: default_bucket(),
            public_base_url: default_public_base_url(),
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_bucket() -> String {
    "tagmill-assets".to_string()
}

fn default_public_base_url() -> String {
    "memory://tagmill".to_string()
}

/// Stand-in credit account for the standalone server; a deployment
/// points the ledger seam at the billing service instead.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreditSettings {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
    #[serde(default)]
    pub unlimited: bool,
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            unlimited: false,
        }
    }
}

fn default_starting_balance() -> i64 {
    100
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_history_ttl_days")]
    pub history_ttl_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            history_ttl_days: default_history_ttl_days(),
        }
    }
}

fn default_history_ttl_days() -> u32 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.api.max_asset_bytes.as_u64(), 25 * 1024 * 1024);
        assert_eq!(config.dispatch.throttle_ms, 2000);
        assert_eq!(config.dispatch.rate_limit_backoff_ms, 5000);
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.retention.history_ttl_days, 90);
    }

    #[test]
    fn dispatch_settings_convert() {
        let settings = DispatchSettings {
            throttle_ms: 100,
            rate_limit_backoff_ms: 300,
            cost_per_variant: 2,
        };
        let dispatch = settings.to_dispatch_config();
        assert_eq!(dispatch.throttle, Duration::from_millis(100));
        assert_eq!(dispatch.rate_limit_backoff, Duration::from_millis(300));
        assert_eq!(dispatch.cost_per_variant, 2);
    }
}
